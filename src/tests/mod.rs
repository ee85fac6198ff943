mod drift_cases;

use std::env;
use std::process;

use usb_audio_kit::config::StreamConfig;

fn main() {
    let mut skew_ppm = 0i64;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--skew" | "-k" => {
                let Some(value) = args.next().and_then(|raw| raw.parse::<i64>().ok()) else {
                    eprintln!("streamctl: --skew expects a value in ppm");
                    process::exit(1);
                };
                skew_ppm = value;
            }
            "--help" | "-h" => {
                println!(
                    "Usage: streamctl [--skew <ppm>]\n\nLaunches the interactive stream monitor over a simulated host session.\n--skew biases the simulated DAC clock to exercise drift correction."
                );
                return;
            }
            other => {
                eprintln!("streamctl: unknown argument '{other}'");
                process::exit(1);
            }
        }
    }

    if let Err(err) = usb_audio_kit::console::ui::run(StreamConfig::default(), skew_ppm) {
        eprintln!("streamctl: {err}");
        process::exit(1);
    }
}

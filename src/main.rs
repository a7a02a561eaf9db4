use std::process;

use log::{debug, log_enabled, warn, Level};

mod bmp;
mod cli;
mod command;
mod compute;
mod device;
mod error;
mod grid;
mod julia;
mod session;
mod typed_buffer;
mod var;

use crate::{device::Context, error::Error, session::Session};

const FILENAME: &str = "julia.bmp";

/// What to say instead of writing `filename` when the kernel never ran.
fn nothing_to_write(dispatches: u64, filename: &str) -> Option<String> {
    if dispatches == 0 {
        Some(format!("No dispatches were issued; not writing {}", filename))
    } else {
        None
    }
}

fn run(options: &cli::Options) -> Result<(), Error> {
    let context = Context::configure(options.platform_index, options.device_index)?;
    println!("Running on platform: {}", context.platform_name());
    println!("Running on device: {}", context.device_name());

    let mut session = Session::prepare(&context, options.global_size, options.c)?;

    let workgroup_size = options.workgroup_size();
    println!("Executing the kernel {} times", options.repeat);
    println!("Global Work Size = {}", session.size());
    match workgroup_size {
        Some(workgroup_size) => println!("Local Work Size = {}", workgroup_size),
        None => println!("Local work size = NULL"),
    }

    let elapsed = session.run(options.repeat, workgroup_size)?;
    println!("Finished in {:.6} seconds", elapsed.as_secs_f32());

    if let Some(message) = nothing_to_write(session.dispatches(), FILENAME) {
        warn!("the kernel never ran, so there is no image to write");
        println!("{}", message);
        session.release();
        return Ok(());
    }

    let size = session.size();
    session.read_back(|pixels| {
        if log_enabled!(Level::Debug) {
            let expected = julia::render(size, options.c);
            debug!(
                "{} of {} pixels differ from the host reference",
                julia::count_mismatches(pixels, &expected, 1),
                pixels.len()
            );
        }

        bmp::save(FILENAME, pixels, size)
    })??;
    println!("Wrote image file {}", FILENAME);

    session.release();
    Ok(())
}

fn main() {
    env_logger::init();

    let options = match cli::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(usage) => {
            eprintln!("{}", usage);
            eprint!("{}", cli::USAGE);
            process::exit(1);
        }
    };
    debug!("{:?}", options);

    if let Err(error) = run(&options) {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_repeats_skip_the_image() {
        let options = cli::parse(["-i", "0"].iter().map(|arg| arg.to_string())).unwrap();
        assert_eq!(options.repeat, 0);
        assert_eq!(
            nothing_to_write(options.repeat as u64, FILENAME).as_deref(),
            Some("No dispatches were issued; not writing julia.bmp")
        );
    }

    #[test]
    fn any_dispatch_writes_the_image() {
        assert_eq!(nothing_to_write(1, FILENAME), None);
        assert_eq!(nothing_to_write(16, FILENAME), None);
    }
}

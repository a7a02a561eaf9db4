//! Command line options.
//!
//! Flags take the form `-flag value`. Repeating a flag overrides the earlier
//! value.

use std::fmt;

use crate::{
    grid::{Size, WorkgroupSize},
    julia::Complex,
};

pub const USAGE: &str = "\
Usage: julia   [options]
Options:
      -d: Device Index (default = 0)
      -p: Platform Index (default = 0)
      -i: Number of Iterations (default = 16)
      -gwx: Global Work Size X AKA Image Width (default = 512)
      -gwy: Global Work Size Y AKA Image Height (default = 512)
      -lwx: Local Work Size X (default = 0 = NULL Local Work Size)
      -lwy: Local Work Size Y (default = 0 = Null Local Work size)
";

#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    pub platform_index: usize,
    pub device_index: usize,
    /// How many times to dispatch the kernel. Doesn't affect the image.
    pub repeat: u32,
    pub global_size: Size,
    /// Local work size; `0` in either dimension means "let the device pick".
    pub local_x: u32,
    pub local_y: u32,
    pub c: Complex,
}

impl Options {
    pub fn workgroup_size(&self) -> Option<WorkgroupSize> {
        WorkgroupSize::from_hint(self.local_x, self.local_y)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            platform_index: 0,
            device_index: 0,
            repeat: 16,
            global_size: Size {
                width: 512,
                height: 512,
            },
            local_x: 0,
            local_y: 0,
            c: Complex::RABBIT,
        }
    }
}

/// Why the arguments were rejected. The caller prints this and [`USAGE`].
#[derive(Debug, PartialEq, Eq)]
pub enum Usage {
    UnknownFlag(String),
    MissingValue(String),
    InvalidValue { flag: String, value: String },
    EmptyImage,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Usage::UnknownFlag(flag) => write!(f, "unknown option {flag}"),
            Usage::MissingValue(flag) => write!(f, "option {flag} needs a value"),
            Usage::InvalidValue { flag, value } => {
                write!(f, "option {flag} expects a non-negative integer, not {value:?}")
            }
            Usage::EmptyImage => write!(f, "image width and height must be positive"),
        }
    }
}

fn value<A: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<A, Usage> {
    let value = value.ok_or_else(|| Usage::MissingValue(flag.to_string()))?;
    value.parse().map_err(|_| Usage::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

/// Parse everything after the program name.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Options, Usage> {
    let mut options = Options::default();

    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-d" => options.device_index = value(&flag, args.next())?,
            "-p" => options.platform_index = value(&flag, args.next())?,
            "-i" => options.repeat = value(&flag, args.next())?,
            "-gwx" => options.global_size.width = value(&flag, args.next())?,
            "-gwy" => options.global_size.height = value(&flag, args.next())?,
            "-lwx" => options.local_x = value(&flag, args.next())?,
            "-lwy" => options.local_y = value(&flag, args.next())?,
            _ => return Err(Usage::UnknownFlag(flag)),
        }
    }

    if options.global_size.width == 0 || options.global_size.height == 0 {
        return Err(Usage::EmptyImage);
    }

    Ok(options)
}

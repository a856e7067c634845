use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
};

use env_logger::{Builder, Env, Target};

use crate::Result;

/// Writes everything to stderr and to a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Installs the global logger, appending every record to `path` as well as stderr.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`.
pub fn init(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .map_err(io::Error::other)?;

    Ok(())
}

use crate::model::NormalizedActivity;
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub enum Writer {
    Stdout(Box<dyn Write>),
    JsonFile(BufWriter<File>),
}

impl Writer {
    /// Render the record as pretty-printed JSON. serde_json writes UTF-8
    /// without escaping non-ASCII text, so notes and names pass through
    /// verbatim; key order follows the struct declarations.
    pub fn write(&mut self, record: &NormalizedActivity) -> Result<()> {
        let serialized = serde_json::to_string_pretty(record)?;
        match self {
            Writer::Stdout(writer) => writeln!(writer, "{}", serialized)?,
            Writer::JsonFile(writer) => {
                writer.write_all(serialized.as_bytes())?;
                writeln!(writer)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::Stdout(ref mut writer) => writer.flush()?,
            Writer::JsonFile(ref mut writer) => writer.flush()?,
        }
        Ok(())
    }
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" | "json" => Ok(Writer::Stdout(Box::new(io::stdout()))),
        path if path.ends_with(".json") => {
            create_parent_dirs(path)?;
            let file = File::create(path)?;
            Ok(Writer::JsonFile(BufWriter::new(file)))
        }
        path => {
            // Default to a JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                create_parent_dirs(path)?;
                let file = File::create(path)?;
                Ok(Writer::JsonFile(BufWriter::new(file)))
            } else {
                Err(anyhow!(
                    "Unknown output format: {}. Use 'stdout', 'json', or a .json file path",
                    output_arg
                ))
            }
        }
    }
}

fn create_parent_dirs(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_words_are_not_output_targets() {
        assert!(create_writer("yaml").is_err());
    }
}

//! Very simple functions for reading and writing the CSV files produced by this crate.
//!
//! Only the parts needed here are implemented: every value is written as text, fields that contain
//! a separator, a quote, or a line break are quoted, and the reader understands exactly that.
//! Like the output it is streaming, records are written and read one at a time.

use crate::HomeResult;
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufWriter, Write},
    path::Path,
};

/// A CSV file open for writing.
pub struct CsvFile(BufWriter<File>);

impl CsvFile {
    /// Create a new file, replacing any that already exists.
    pub fn create<P: AsRef<Path>>(pth: P) -> HomeResult<Self> {
        let f = File::create(pth.as_ref())?;
        Ok(CsvFile(BufWriter::new(f)))
    }

    /// Open a file to add records at the end, creating it if needed.
    pub fn append<P: AsRef<Path>>(pth: P) -> HomeResult<Self> {
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(pth.as_ref())?;
        Ok(CsvFile(BufWriter::new(f)))
    }
}

impl CsvWriter for CsvFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.0
    }
}

impl CsvWriter for Vec<u8> {
    fn output(&mut self) -> &mut dyn Write {
        self
    }
}

pub trait CsvWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Write a single record (line) to the file.
    fn write_record<I, S>(&mut self, fields: I) -> HomeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let out = self.output();

        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            write_field(out, field.as_ref())?;
        }
        out.write_all(b"\n")?;

        Ok(())
    }

    /// Push everything written so far to the underlying output.
    fn flush(&mut self) -> HomeResult<()> {
        self.output().flush()?;
        Ok(())
    }
}

fn write_field(out: &mut dyn Write, field: &str) -> HomeResult<()> {
    let needs_quotes = field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r'));

    if needs_quotes {
        write!(out, "\"{}\"", field.replace('"', "\"\""))?;
    } else {
        out.write_all(field.as_bytes())?;
    }

    Ok(())
}

/// Reads records written by a [CsvWriter].
pub struct CsvReader<R> {
    input: R,
    line: String,
}

impl<R: BufRead> CsvReader<R> {
    pub fn new(input: R) -> Self {
        CsvReader {
            input,
            line: String::new(),
        }
    }

    /// Get the next record, or None at the end of the input. Blank lines are skipped.
    pub fn read_record(&mut self) -> HomeResult<Option<Vec<String>>> {
        let mut fields = vec![];
        let mut field = String::new();
        let mut in_quotes = false;

        loop {
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                if in_quotes {
                    return Err("unterminated quoted field at end of input".into());
                }
                return Ok(None);
            }

            if !in_quotes && self.line.trim_end_matches(['\r', '\n']).is_empty() {
                continue;
            }

            let mut chars = self.line.chars().peekable();
            while let Some(c) = chars.next() {
                if in_quotes {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    } else {
                        field.push(c);
                    }
                } else {
                    match c {
                        '"' => in_quotes = true,
                        ',' => fields.push(std::mem::take(&mut field)),
                        '\r' | '\n' => {}
                        _ => field.push(c),
                    }
                }
            }

            if !in_quotes {
                fields.push(field);
                return Ok(Some(fields));
            }
        }
    }
}

impl<R: BufRead> Iterator for CsvReader<R> {
    type Item = HomeResult<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_record() {
        let mut buf: Vec<u8> = vec![];
        buf.write_record(["a", "b", "c"]).unwrap();
        buf.write_record(["with,comma", "with \"quote\"", ""]).unwrap();
        buf.write_record(["two\nlines", "plain"]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "a,b,c\n\"with,comma\",\"with \"\"quote\"\"\",\n\"two\nlines\",plain\n"
        );
    }

    #[test]
    fn test_read_what_was_written() {
        let mut buf: Vec<u8> = vec![];
        buf.write_record(["user_id", "name"]).unwrap();
        buf.write_record(["12", "Smith, \"Jo\"\nthe second"]).unwrap();
        buf.write_record(["13", ""]).unwrap();

        let records: Vec<Vec<String>> = CsvReader::new(&buf[..])
            .collect::<HomeResult<_>>()
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], vec!["user_id", "name"]);
        assert_eq!(records[1], vec!["12", "Smith, \"Jo\"\nthe second"]);
        assert_eq!(records[2], vec!["13", ""]);
    }

    #[test]
    fn test_read_edge_cases() {
        let text = "a,b\r\n\n1,2";
        let records: Vec<Vec<String>> = CsvReader::new(text.as_bytes())
            .collect::<HomeResult<_>>()
            .unwrap();
        assert_eq!(records, vec![vec!["a", "b"], vec!["1", "2"]]);

        let mut unterminated = CsvReader::new("1,\"open".as_bytes());
        assert!(unterminated.read_record().is_err());
    }
}

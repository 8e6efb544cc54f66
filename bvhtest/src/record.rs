//! The line-oriented record stream.
//!
//! Downstream analysis parses these lines by position, so the field order
//! and the `add` / `sub` / `que` tags are fixed:
//!
//! ```text
//! add, <live>, <depth>, <nanos>, "<orthotope>"
//! sub, <live>, <depth>, <nanos>, "<key>"
//! que, <live>, <depth>, <nanos>, <count>, "<region>"
//! <step>, <depth>, <score>
//! ```
//!
//! The last, untagged shape is emitted by comparison runs.

use std::fmt;
use std::io::{self, BufWriter, Write};

use bvh_rs::Orthotope;

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Add {
        live: usize,
        depth: usize,
        nanos: u128,
        orthotope: Orthotope,
    },
    Sub {
        live: usize,
        depth: usize,
        nanos: u128,
        key: usize,
    },
    Que {
        live: usize,
        depth: usize,
        nanos: u128,
        count: usize,
        region: Orthotope,
    },
    Growth {
        step: usize,
        depth: usize,
        score: f64,
    },
}

impl Record {
    /// The same record with its duration zeroed. Two runs with the same seed
    /// agree on everything else.
    pub fn without_timing(&self) -> Record {
        let mut record = self.clone();
        match &mut record {
            Record::Add { nanos, .. } | Record::Sub { nanos, .. } | Record::Que { nanos, .. } => {
                *nanos = 0;
            }
            Record::Growth { .. } => {}
        }
        record
    }

    /// Live item count carried by the record, if it has one.
    pub fn live(&self) -> Option<usize> {
        match *self {
            Record::Add { live, .. } | Record::Sub { live, .. } | Record::Que { live, .. } => {
                Some(live)
            }
            Record::Growth { .. } => None,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Add {
                live,
                depth,
                nanos,
                orthotope,
            } => write!(f, "add, {live}, {depth}, {nanos}, \"{orthotope}\""),
            Record::Sub {
                live,
                depth,
                nanos,
                key,
            } => write!(f, "sub, {live}, {depth}, {nanos}, \"{key}\""),
            Record::Que {
                live,
                depth,
                nanos,
                count,
                region,
            } => write!(f, "que, {live}, {depth}, {nanos}, {count}, \"{region}\""),
            // Scores are reported truncated to an integer.
            Record::Growth { step, depth, score } => {
                write!(f, "{step}, {depth}, {}", *score as i64)
            }
        }
    }
}

/// Destination for records.
pub trait RecordSink {
    fn emit(&mut self, record: Record) -> io::Result<()>;

    /// Called once after the last record of a run.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects records in memory.
impl RecordSink for Vec<Record> {
    fn emit(&mut self, record: Record) -> io::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Writes one line per record through a buffer.
pub struct LineSink<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> RecordSink for LineSink<W> {
    fn emit(&mut self, record: Record) -> io::Result<()> {
        writeln!(self.out, "{record}")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orth() -> Orthotope {
        Orthotope::new([1, 2, 3], [40, 50, 60]).unwrap()
    }

    #[test]
    fn test_line_shapes() {
        let add = Record::Add {
            live: 3,
            depth: 2,
            nanos: 1500,
            orthotope: orth(),
        };
        assert_eq!(add.to_string(), "add, 3, 2, 1500, \"{[1 2 3] [40 50 60]}\"");

        let sub = Record::Sub {
            live: 2,
            depth: 2,
            nanos: 900,
            key: 17,
        };
        assert_eq!(sub.to_string(), "sub, 2, 2, 900, \"17\"");

        let que = Record::Que {
            live: 2,
            depth: 2,
            nanos: 42,
            count: 0,
            region: orth(),
        };
        assert_eq!(
            que.to_string(),
            "que, 2, 2, 42, 0, \"{[1 2 3] [40 50 60]}\""
        );

        let growth = Record::Growth {
            step: 9,
            depth: 5,
            score: 1234.9,
        };
        assert_eq!(growth.to_string(), "9, 5, 1234");
    }

    #[test]
    fn test_without_timing() {
        let add = Record::Add {
            live: 1,
            depth: 1,
            nanos: 77,
            orthotope: orth(),
        };
        assert_eq!(
            add.without_timing(),
            Record::Add {
                live: 1,
                depth: 1,
                nanos: 0,
                orthotope: orth()
            }
        );
        let growth = Record::Growth {
            step: 0,
            depth: 1,
            score: 0.0,
        };
        assert_eq!(growth.without_timing(), growth);
    }

    #[test]
    fn test_line_sink() {
        let mut sink = LineSink::new(Vec::new());
        sink.emit(Record::Sub {
            live: 0,
            depth: 0,
            nanos: 5,
            key: 0,
        })
        .unwrap();
        sink.emit(Record::Growth {
            step: 1,
            depth: 2,
            score: 3.0,
        })
        .unwrap();
        sink.finish().unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text, "sub, 0, 0, 5, \"0\"\n1, 2, 3\n");
    }
}

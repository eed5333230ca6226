//! A sorted on-disk run of cells produced by one ingestion worker.
//!
//! Wire format, one cell:
//!
//!     "<first_id> <num_records>\n"
//!     "<sid1> <tf1> <df1> <sid2> <tf2> <df2> ... \n"

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::arbiter::FileHandleArbiter;
use crate::{CliError, CliResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub first_id: i32,
    pub records: Vec<(i32, u64, u32)>,
}

enum Handle {
    Closed,
    Writing(BufWriter<File>),
    Reading(BufReader<File>),
}

pub struct Batch {
    path: PathBuf,
    handle: Handle,
    read_offset: u64,
    front: Option<Cell>,
    drained: bool,
}

impl Batch {
    pub fn create_for_write(
        dir: &Path,
        index: usize,
        arbiter: &FileHandleArbiter,
    ) -> CliResult<Self> {
        let path = dir.join(format!("batch-{:08}.cooc", index));
        arbiter.acquire()?;
        let file = File::create(&path).map_err(|err| {
            CliError::Other(format!(
                "could not create batch file {}: {}",
                path.display(),
                err
            ))
        })?;

        Ok(Batch {
            path,
            handle: Handle::Writing(BufWriter::new(file)),
            read_offset: 0,
            front: None,
            drained: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_cell(&mut self, cell: &Cell) -> CliResult<()> {
        if cell.records.is_empty() {
            return Err(CliError::Other(
                "cannot write a cell with no records".to_string(),
            ));
        }

        let writer = match &mut self.handle {
            Handle::Writing(w) => w,
            _ => return Err(CliError::Other("batch is not open for writing".to_string())),
        };

        write!(writer, "{} {}\n", cell.first_id, cell.records.len())?;

        for (i, (sid, tf, df)) in cell.records.iter().enumerate() {
            if i > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{} {} {}", sid, tf, df)?;
        }
        writeln!(writer)?;

        Ok(())
    }

    pub fn finish_write(&mut self, arbiter: &FileHandleArbiter) -> CliResult<()> {
        if let Handle::Writing(writer) = &mut self.handle {
            writer.flush()?;
            self.handle = Handle::Closed;
            arbiter.release();
        }
        Ok(())
    }

    pub fn open_for_read(&mut self, arbiter: &FileHandleArbiter) -> CliResult<()> {
        if matches!(self.handle, Handle::Reading(_)) {
            return Ok(());
        }

        arbiter.acquire()?;
        let mut file = File::open(&self.path).map_err(|err| {
            CliError::Other(format!(
                "could not open batch file {}: {}",
                self.path.display(),
                err
            ))
        })?;
        file.seek(SeekFrom::Start(self.read_offset))?;
        self.handle = Handle::Reading(BufReader::new(file));

        self.ensure_front()
    }

    /// Idempotent. Remembers the current byte offset so that a later
    /// `open_for_read` resumes exactly where this left off.
    pub fn close_for_read(&mut self, arbiter: &FileHandleArbiter) -> CliResult<()> {
        if let Handle::Reading(reader) = &mut self.handle {
            self.read_offset = reader.stream_position()?;
            self.handle = Handle::Closed;
            arbiter.release();
        }
        Ok(())
    }

    pub fn peek_first_id(&self) -> Option<i32> {
        self.front.as_ref().map(|cell| cell.first_id)
    }

    /// Returns and consumes the current front cell, pre-fetching the next
    /// one so `peek_first_id` stays valid even across a close/reopen.
    pub fn read_cell(&mut self, arbiter: &FileHandleArbiter) -> CliResult<Option<Cell>> {
        self.open_for_read(arbiter)?;
        let popped = self.front.take();
        self.ensure_front()?;
        Ok(popped)
    }

    pub fn is_drained(&self) -> bool {
        self.drained && self.front.is_none()
    }

    fn ensure_front(&mut self) -> CliResult<()> {
        if self.front.is_some() || self.drained {
            return Ok(());
        }
        match self.parse_cell()? {
            Some(cell) => self.front = Some(cell),
            None => self.drained = true,
        }
        Ok(())
    }

    fn parse_cell(&mut self) -> CliResult<Option<Cell>> {
        let reader = match &mut self.handle {
            Handle::Reading(r) => r,
            _ => return Err(CliError::Other("batch is not open for reading".to_string())),
        };

        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Ok(None);
        }

        let mut header_fields = header.trim_end().split_whitespace();
        let first_id: i32 = header_fields
            .next()
            .ok_or_else(|| corrupt("missing first_id"))?
            .parse()
            .map_err(|_| corrupt("invalid first_id"))?;
        let num_records: usize = header_fields
            .next()
            .ok_or_else(|| corrupt("missing record count"))?
            .parse()
            .map_err(|_| corrupt("invalid record count"))?;
        if header_fields.next().is_some() {
            return Err(corrupt("trailing data in cell header"));
        }
        if num_records == 0 {
            return Err(corrupt("cell declares zero records"));
        }

        let mut payload = String::new();
        if reader.read_line(&mut payload)? == 0 {
            return Err(corrupt("missing cell payload"));
        }

        let fields: Vec<&str> = payload.trim_end().split_whitespace().collect();
        if fields.len() != num_records * 3 {
            return Err(corrupt("record count does not match payload"));
        }

        let mut records = Vec::with_capacity(num_records);
        for chunk in fields.chunks(3) {
            let sid: i32 = chunk[0].parse().map_err(|_| corrupt("invalid second_id"))?;
            let tf: u64 = chunk[1].parse().map_err(|_| corrupt("invalid cooc_tf"))?;
            let df: u32 = chunk[2].parse().map_err(|_| corrupt("invalid cooc_df"))?;
            records.push((sid, tf, df));
        }

        Ok(Some(Cell { first_id, records }))
    }
}

fn corrupt(message: &str) -> CliError {
    CliError::Other(format!("CORRUPT_BATCH: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_cell_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = FileHandleArbiter::new(4);

        let mut batch = Batch::create_for_write(dir.path(), 0, &arbiter).unwrap();
        batch
            .write_cell(&Cell {
                first_id: 2,
                records: vec![(5, 3, 2), (9, 1, 1)],
            })
            .unwrap();
        batch.finish_write(&arbiter).unwrap();

        batch.open_for_read(&arbiter).unwrap();
        assert_eq!(batch.peek_first_id(), Some(2));

        let cell = batch.read_cell(&arbiter).unwrap().unwrap();
        assert_eq!(cell.first_id, 2);
        assert_eq!(cell.records, vec![(5, 3, 2), (9, 1, 1)]);

        assert!(batch.read_cell(&arbiter).unwrap().is_none());
        assert!(batch.is_drained());
    }

    #[test]
    fn test_close_and_reopen_preserves_offset() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = FileHandleArbiter::new(4);

        let mut batch = Batch::create_for_write(dir.path(), 0, &arbiter).unwrap();
        batch
            .write_cell(&Cell {
                first_id: 1,
                records: vec![(2, 1, 1)],
            })
            .unwrap();
        batch
            .write_cell(&Cell {
                first_id: 3,
                records: vec![(4, 1, 1)],
            })
            .unwrap();
        batch.finish_write(&arbiter).unwrap();

        batch.open_for_read(&arbiter).unwrap();
        batch.read_cell(&arbiter).unwrap();
        batch.close_for_read(&arbiter).unwrap();
        assert_eq!(arbiter.current(), 0);

        batch.open_for_read(&arbiter).unwrap();
        let cell = batch.read_cell(&arbiter).unwrap().unwrap();
        assert_eq!(cell.first_id, 3);
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.cooc");
        std::fs::write(&path, "1 2\n5 1\n").unwrap();

        let arbiter = FileHandleArbiter::new(4);
        let mut batch = Batch {
            path,
            handle: Handle::Closed,
            read_offset: 0,
            front: None,
            drained: false,
        };

        let err = batch.open_for_read(&arbiter).unwrap_err();
        assert!(err.to_string().contains("CORRUPT_BATCH"));
    }
}

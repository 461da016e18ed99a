use std::io::{Seek, SeekFrom, Write};

use binrw::BinWrite;

use super::{Dialect, Header, Layout, Tag};
use crate::{Error, Result};

/// A handle on a record opened by a [`Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// Bookkeeping of a record written through a [`Writer`].
#[derive(Debug, Clone)]
pub struct Written {
    /// The record type.
    pub tag: Tag,

    /// The IFF group (`FORM`, `LIST`, …) for composite IFF records.
    pub group: Option<Tag>,

    /// How the record is laid out.
    pub layout: Layout,

    /// Position of the header, relative to where the [`Writer`] started.
    pub offset: u64,

    /// The total size including the header, set once the record is finished.
    pub size: Option<u64>,

    /// Records nested in this one, in the order they were opened.
    pub children: Vec<RecordId>,
}

impl Written {
    pub fn is_finished(&self) -> bool {
        self.size.is_some()
    }
}

/// Writes nested, length-prefixed records to a seekable sink, back-patching
/// each header with the real size once the record is closed.
///
/// Records are kept in an arena and the open ones on a stack of indices:
/// only the innermost open record receives bytes.
#[derive(Debug)]
pub struct Writer<W: Write + Seek> {
    sink: W,
    dialect: Dialect,
    origin: u64,
    records: Vec<Written>,
    roots: Vec<RecordId>,
    stack: Vec<RecordId>,
}

impl<W: Write + Seek> Writer<W> {
    /// Start writing records at the current position of `sink`, which becomes the offset origin.
    pub fn new(mut sink: W, dialect: Dialect) -> Result<Self> {
        let origin = sink.stream_position()?;

        Ok(Self {
            sink,
            dialect,
            origin,
            records: Vec::new(),
            roots: Vec::new(),
            stack: Vec::new(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Current position, relative to the origin.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.sink.stream_position()? - self.origin)
    }

    /// Number of currently open records.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bookkeeping of a record opened with this writer, [`None`] for ids it never handed out.
    pub fn record(&self, id: RecordId) -> Option<&Written> {
        self.records.get(id.0)
    }

    /// The records opened at the top level, in order.
    pub fn roots(&self) -> impl Iterator<Item = &Written> + '_ {
        self.roots.iter().map(|id| &self.records[id.0])
    }

    /// Open a record of the provided `layout` inside the innermost open record.
    ///
    /// IFF composites are opened as `FORM` groups, see [`Writer::open_group`] for the others.
    pub fn open(&mut self, tag: Tag, layout: Layout) -> Result<RecordId> {
        let group = match (self.dialect, layout) {
            (Dialect::Iff, Layout::Composite) => Some(Tag::from_raw(*b"FORM")),
            _ => None,
        };

        self.push(tag, group, layout)
    }

    /// Open an IFF group chunk, such as `LIST` or `CAT `, of the provided `tag` type.
    pub fn open_group(&mut self, group: Tag, tag: Tag) -> Result<RecordId> {
        if self.dialect != Dialect::Iff {
            return Err(Error::UnsupportedRecord {
                tag: group,
                dialect: self.dialect.into(),
            });
        }

        self.push(tag, Some(group), Layout::Composite)
    }

    fn push(&mut self, tag: Tag, group: Option<Tag>, layout: Layout) -> Result<RecordId> {
        let tag = Tag::new(*tag.as_bytes())?;
        if !self.dialect.supports(layout) {
            return Err(Error::UnsupportedRecord {
                tag,
                dialect: self.dialect.into(),
            });
        }

        if let Some(parent) = self.stack.last() {
            let parent = &self.records[parent.0];

            if parent.is_finished() {
                return Err(Error::RecordFinished(parent.tag));
            }
            if parent.layout != Layout::Composite {
                return Err(Error::NotComposite(parent.tag));
            }
        }

        let offset = self.position()?;
        let reserved = self.dialect.header_len(layout);

        match group {
            // The group type is final, only the group and size are patched later.
            Some(_) => {
                self.sink.write_all(&[0; Dialect::HEADER_LEN as usize])?;
                self.sink.write_all(tag.as_bytes())?;
            }
            None => self.sink.write_all(&vec![0; reserved as usize])?,
        }

        let id = RecordId(self.records.len());
        self.records.push(Written {
            tag,
            group,
            layout,
            offset,
            size: None,
            children: Vec::new(),
        });

        match self.stack.last() {
            Some(parent) => self.records[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        self.stack.push(id);

        tracing::trace!("Opened {layout:?} record `{tag}` at offset {offset}");

        Ok(id)
    }

    /// Append `bytes` to the innermost open record.
    pub fn write(&mut self, bytes: &[u8]) -> Result {
        let current = self.stack.last().ok_or(Error::NoOpenRecord)?;
        let current = &self.records[current.0];

        if current.is_finished() {
            return Err(Error::RecordFinished(current.tag));
        }

        self.sink.write_all(bytes)?;

        Ok(())
    }

    /// Close the innermost open record, back-patching its header, and return its size.
    ///
    /// The returned size never accounts for the IFF pad byte, which is still
    /// written after odd bodies so that the next record starts on an even offset.
    pub fn close(&mut self) -> Result<u64> {
        let id = self.stack.pop().ok_or(Error::NoOpenRecord)?;
        let record = &self.records[id.0];

        if record.is_finished() {
            return Err(Error::RecordFinished(record.tag));
        }

        let end = self.sink.stream_position()?;
        let size = end - (self.origin + record.offset);

        let header = Header::for_record(self.dialect, record.layout, record.tag, size).ok_or(
            Error::SizeOverflow {
                tag: record.tag,
                size,
            },
        )?;
        let header = match (header, record.group) {
            (Header::Iff { size, .. }, Some(group)) => Header::Iff { tag: group, size },
            (header, _) => header,
        };

        let mut patch = std::io::Cursor::new(Vec::with_capacity(header.len() as usize));
        header.write(&mut patch)?;

        self.sink
            .seek(SeekFrom::Start(self.origin + record.offset))?;
        self.sink.write_all(patch.get_ref())?;
        self.sink.seek(SeekFrom::Start(end))?;

        if self.dialect.pads() && (size - Dialect::HEADER_LEN) % 2 == 1 {
            self.sink.write_all(&[0])?;
        }

        tracing::trace!("Closed record `{}` with a size of {size} bytes", record.tag);

        self.records[id.0].size = Some(size);

        Ok(size)
    }

    /// Close every open record, innermost first.
    pub fn finish(&mut self) -> Result {
        while !self.stack.is_empty() {
            self.close()?;
        }

        Ok(self.sink.flush()?)
    }

    /// Finish every open record and give back the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;

        Ok(self.sink)
    }
}

impl<W: Write + Seek> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Writer::write(self, buf)
            .map(|()| buf.len())
            .map_err(|err| match err {
                Error::Io(err) => err,
                err => std::io::Error::other(err),
            })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.sink.flush()
    }
}

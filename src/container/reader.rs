use std::io::{self, Read, Seek, SeekFrom};

use binrw::BinReaderExt;
use strum::EnumDiscriminants;

use super::{fields::Fields, Dialect, Tag};
use crate::Result;

/// The body of a parsed leaf record.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// The record has a known field layout.
    Parsed(Fields),

    /// The raw bytes of the record, for unknown or unparseable records.
    Raw(Vec<u8>),
}

/// A record parsed by a [`Reader`], with its offset relative to where parsing started.
#[derive(Debug, Clone, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(RecordKind))]
pub enum Record {
    /// A leaf record.
    Data {
        tag: Tag,
        offset: u64,
        size: u64,
        body: Body,
    },

    /// A record holding other records, the `group` is set for IFF group chunks.
    Composite {
        tag: Tag,
        group: Option<Tag>,
        offset: u64,
        size: u64,
        children: Vec<Record>,
    },

    /// Trailing bytes too short to hold a record header.
    Free { offset: u64, size: u64 },
}

impl Record {
    pub fn tag(&self) -> Tag {
        match self {
            Self::Data { tag, .. } | Self::Composite { tag, .. } => *tag,
            Self::Free { .. } => Tag::FREE,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            Self::Data { offset, .. }
            | Self::Composite { offset, .. }
            | Self::Free { offset, .. } => *offset,
        }
    }

    /// Total size, header included and IFF pad byte excluded.
    pub fn size(&self) -> u64 {
        match self {
            Self::Data { size, .. } | Self::Composite { size, .. } | Self::Free { size, .. } => {
                *size
            }
        }
    }

    pub fn children(&self) -> &[Record] {
        match self {
            Self::Composite { children, .. } => children,
            _ => &[],
        }
    }

    /// Find the first record of type `tag` in this record and its descendants, depth-first.
    pub fn find(&self, tag: Tag) -> Option<&Record> {
        if self.tag() == tag {
            return Some(self);
        }

        self.children().iter().find_map(|child| child.find(tag))
    }
}

/// Parses a stream of nested records into a tree of [`Record`]s.
///
/// Declared sizes are never trusted past the bounds of the parent record:
/// a record claiming more than what is left is clamped to the remainder.
#[derive(Debug, Clone)]
pub struct Reader {
    dialect: Dialect,
    composites: Vec<Tag>,
}

struct Prefix {
    tag: Tag,
    group: Option<Tag>,
    header_len: u64,
    size: u64,
}

impl Reader {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            composites: dialect.default_composites().to_vec(),
        }
    }

    /// Replace the set of tags parsed as composite records.
    ///
    /// For IFF, these are the group tags (`FORM`, `LIST`, …) rather than the form types.
    pub fn with_composites(mut self, composites: impl IntoIterator<Item = Tag>) -> Self {
        self.composites = composites.into_iter().collect();
        self
    }

    /// Parse every record of `source` from its current position to its end.
    pub fn parse_all<R: Read + Seek>(&self, source: &mut R) -> Result<Vec<Record>> {
        let start = source.stream_position()?;
        let end = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(start))?;

        self.parse(source, end.saturating_sub(start))
    }

    /// Parse the records held in the next `len` bytes of `source`.
    pub fn parse<R: Read + Seek>(&self, source: &mut R, len: u64) -> Result<Vec<Record>> {
        let origin = source.stream_position()?;
        let mut records = Vec::new();

        self.parse_recursive(source, origin, len, &mut records)?;

        Ok(records)
    }

    fn parse_recursive<R: Read + Seek>(
        &self,
        source: &mut R,
        origin: u64,
        mut remaining: u64,
        records: &mut Vec<Record>,
    ) -> Result {
        while remaining > 0 {
            let offset = source.stream_position()? - origin;

            let Some(prefix) = self.prefix(source, remaining)? else {
                source.seek(SeekFrom::Start(origin + offset + remaining))?;
                records.push(Record::Free {
                    offset,
                    size: remaining,
                });

                break;
            };
            let Prefix {
                tag,
                group,
                header_len,
                size,
            } = prefix;

            let record = if group.is_some() || self.is_composite(tag) {
                let mut children = Vec::new();
                self.parse_recursive(source, origin, size - header_len, &mut children)?;

                Record::Composite {
                    tag,
                    group,
                    offset,
                    size,
                    children,
                }
            } else {
                let len = size - header_len;
                let mut raw = Vec::new();
                if source.by_ref().take(len).read_to_end(&mut raw)? as u64 != len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("record `{tag}` at offset {offset} holds fewer than {len} bytes"),
                    )
                    .into());
                }

                let body = match Fields::parse(self.dialect, tag, &raw) {
                    Some(Ok(fields)) => Body::Parsed(fields),
                    Some(Err(err)) => {
                        tracing::warn!("Keeping record `{tag}` at offset {offset} raw: {err}");

                        Body::Raw(raw)
                    }
                    None => Body::Raw(raw),
                };

                Record::Data {
                    tag,
                    offset,
                    size,
                    body,
                }
            };

            source.seek(SeekFrom::Start(origin + offset + size))?;
            remaining -= size;

            if self.dialect.pads() && (size - Dialect::HEADER_LEN) % 2 == 1 && remaining > 0 {
                source.seek(SeekFrom::Current(1))?;
                remaining -= 1;
            }

            tracing::trace!("Parsed record `{tag}` of {size} bytes at offset {offset}");

            records.push(record);
        }

        Ok(())
    }

    fn is_composite(&self, tag: Tag) -> bool {
        self.dialect == Dialect::QuickTime && self.composites.contains(&tag)
    }

    /// Read the next record header, clamping its size to the `remaining` bytes of the parent.
    ///
    /// Returns [`None`] when `remaining` is too short to hold any header.
    fn prefix<R: Read + Seek>(&self, source: &mut R, remaining: u64) -> Result<Option<Prefix>> {
        if remaining < Dialect::HEADER_LEN {
            return Ok(None);
        }

        let (tag, group, header_len, declared) = match self.dialect {
            Dialect::QuickTime => {
                let size: u32 = source.read_be()?;
                let tag = Tag::from_raw(source.read_be()?);

                match size {
                    // Extends to the end of the parent.
                    0 => (tag, None, Dialect::HEADER_LEN, remaining),
                    1 if remaining < Dialect::EXTENDED_HEADER_LEN => {
                        source.seek(SeekFrom::Current(-(Dialect::HEADER_LEN as i64)))?;

                        return Ok(None);
                    }
                    1 => {
                        let size: u64 = source.read_be()?;

                        (tag, None, Dialect::EXTENDED_HEADER_LEN, size)
                    }
                    size => (tag, None, Dialect::HEADER_LEN, size as u64),
                }
            }
            Dialect::Iff => {
                let tag = Tag::from_raw(source.read_be()?);
                let size: u32 = source.read_be()?;
                let declared = size as u64 + Dialect::HEADER_LEN;

                if self.composites.contains(&tag) && remaining >= Dialect::HEADER_LEN + 4 {
                    let kind = Tag::from_raw(source.read_be()?);

                    (kind, Some(tag), Dialect::HEADER_LEN + 4, declared)
                } else {
                    (tag, None, Dialect::HEADER_LEN, declared)
                }
            }
        };

        let size = if declared > remaining {
            tracing::warn!(
                "Record `{tag}` declares {declared} bytes but only {remaining} are left, clamping"
            );

            remaining
        } else if declared < header_len {
            tracing::warn!("Record `{tag}` declares {declared} bytes, less than its header");

            header_len
        } else {
            declared
        };

        Ok(Some(Prefix {
            tag,
            group,
            header_len,
            size,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::container::{Layout, Writer};

    fn tag(name: &[u8; 4]) -> Tag {
        Tag::from_raw(*name)
    }

    #[test]
    fn it_reads_back_a_minimal_iff_chunk() {
        let bytes = [0x54, 0x45, 0x53, 0x54, 0, 0, 0, 3, 1, 2, 3, 0];

        let records = Reader::new(Dialect::Iff)
            .parse_all(&mut Cursor::new(&bytes[..]))
            .expect("parse");

        assert_eq!(
            records,
            [Record::Data {
                tag: tag(b"TEST"),
                offset: 0,
                size: 11,
                body: Body::Raw(vec![1, 2, 3]),
            }]
        );
    }

    #[test]
    fn it_handles_zero_and_extended_sizes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x00\x00\x00\x01skip\x00\x00\x00\x00\x00\x00\x00\x12ab");
        bytes.extend_from_slice(b"\x00\x00\x00\x00mdat12345");

        let records = Reader::new(Dialect::QuickTime)
            .parse_all(&mut Cursor::new(&bytes))
            .expect("parse");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].size(), 18);
        assert_eq!(
            records[1],
            Record::Data {
                tag: tag(b"mdat"),
                offset: 18,
                size: 13,
                body: Body::Raw(b"12345".to_vec()),
            }
        );
    }

    #[test]
    fn it_reports_truncated_records_without_trusting_their_size() {
        // An extended `mdat` claiming exabytes, with only 4 bytes of body behind it.
        let bytes = b"\x00\x00\x00\x01mdat\x7f\xff\xff\xff\xff\xff\x00\x00body";

        let result = Reader::new(Dialect::QuickTime).parse(&mut Cursor::new(&bytes[..]), u64::MAX / 2);

        assert!(matches!(
            result,
            Err(crate::Error::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn it_clamps_lying_sizes_to_the_parent() {
        // `trak` claims 4096 bytes while `moov` only holds 12 more.
        let bytes = b"\x00\x00\x00\x14moov\x00\x00\x10\x00trak\x00\x00\x00\x00";

        let records = Reader::new(Dialect::QuickTime)
            .parse_all(&mut Cursor::new(&bytes[..]))
            .expect("parse");

        let moov = &records[0];
        assert_eq!(moov.size(), 20);
        assert_eq!(moov.children().len(), 1);
        assert_eq!(moov.children()[0].size(), 12);
        assert_eq!(
            moov.children()[0].children(),
            [Record::Free { offset: 16, size: 4 }]
        );
    }

    #[test]
    fn it_keeps_short_trailers_as_free_records() {
        let bytes = b"\x00\x00\x00\x0cudta\x00\x00\x00\x00";

        let records = Reader::new(Dialect::QuickTime)
            .parse_all(&mut Cursor::new(&bytes[..]))
            .expect("parse");

        assert_eq!(
            records[0].children(),
            [Record::Free { offset: 8, size: 4 }]
        );
    }

    #[test]
    fn it_makes_progress_on_undersized_records() {
        let bytes = b"\x00\x00\x00\x02abcd\x00\x00\x00\x08efgh";

        let records = Reader::new(Dialect::QuickTime)
            .parse_all(&mut Cursor::new(&bytes[..]))
            .expect("parse");

        assert_eq!(
            records.iter().map(Record::tag).collect::<Vec<_>>(),
            [tag(b"abcd"), tag(b"efgh")]
        );
    }

    #[test]
    fn it_parses_known_fields() {
        let mut writer = Writer::new(Cursor::new(Vec::new()), Dialect::QuickTime).expect("writer");
        writer.open(tag(b"ftyp"), Layout::Data).expect("open");
        writer.write(b"qt  \x00\x00\x00\x00qt  ").expect("write");
        writer.finish().expect("finish");

        let mut sink = writer.into_inner().expect("sink");
        sink.set_position(0);
        let records = Reader::new(Dialect::QuickTime)
            .parse_all(&mut sink)
            .expect("parse");

        assert!(matches!(
            &records[0],
            Record::Data {
                body: Body::Parsed(Fields::FileType(_)),
                ..
            }
        ));
        assert_eq!(
            RecordKind::from(&records[0]),
            RecordKind::Data,
        );
    }

    /// Write a random tree of records, returning the expected `(depth, tag, size)` in pre-order.
    fn write_tree(
        writer: &mut Writer<Cursor<Vec<u8>>>,
        rng: &mut StdRng,
        depth: usize,
        expected: &mut Vec<(usize, Tag, u64)>,
    ) {
        for _ in 0..rng.gen_range(1..4) {
            let composite = depth < 3 && rng.gen_bool(0.4);
            let name = if composite {
                match writer.dialect() {
                    Dialect::QuickTime => *b"trak",
                    Dialect::Iff => *b"ANIM",
                }
            } else {
                [b'd', b'a', b't', b'a' + rng.gen_range(0..26)]
            };

            let index = expected.len();
            expected.push((depth, tag(&name), 0));

            if composite {
                writer.open(tag(&name), Layout::Composite).expect("open");
                write_tree(writer, rng, depth + 1, expected);
            } else {
                writer.open(tag(&name), Layout::Data).expect("open");
                let body: Vec<u8> = (0..rng.gen_range(0..40)).map(|_| rng.gen()).collect();
                writer.write(&body).expect("write");
            }

            expected[index].2 = writer.close().expect("close");
        }
    }

    fn flatten(records: &[Record], depth: usize, out: &mut Vec<(usize, Tag, u64)>) {
        for record in records {
            out.push((depth, record.tag(), record.size()));
            flatten(record.children(), depth + 1, out);
        }
    }

    #[test]
    fn it_reads_back_random_trees() {
        let mut rng = StdRng::seed_from_u64(0x1ff);

        for dialect in [Dialect::Iff, Dialect::QuickTime] {
            for _ in 0..32 {
                let mut writer = Writer::new(Cursor::new(Vec::new()), dialect).expect("writer");
                let mut expected = Vec::new();
                write_tree(&mut writer, &mut rng, 0, &mut expected);

                let mut sink = writer.into_inner().expect("sink");
                sink.set_position(0);
                let records = Reader::new(dialect).parse_all(&mut sink).expect("parse");

                let mut parsed = Vec::new();
                flatten(&records, 0, &mut parsed);
                assert_eq!(parsed, expected);

                if dialect == Dialect::Iff {
                    let mut offsets = Vec::new();
                    collect_offsets(&records, &mut offsets);
                    assert!(offsets.iter().all(|offset| offset % 2 == 0));
                }
            }
        }
    }

    fn collect_offsets(records: &[Record], out: &mut Vec<u64>) {
        for record in records {
            out.push(record.offset());
            collect_offsets(record.children(), out);
        }
    }
}

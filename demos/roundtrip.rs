use std::io::Cursor;

use mediachunk::{
    byterun1,
    container::{fields::ColorMap, Body, Dialect, Fields, Layout, Reader, Record, Tag, Writer},
    palette::Palette,
    tscc::{Codec, Config, Frame, FrameFlags},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

/// A square bouncing over a striped background.
fn frame(n: usize) -> Vec<u8> {
    let (x0, y0) = ((n * 3) % (WIDTH - 8), (n * 2) % (HEIGHT - 8));

    (0..WIDTH * HEIGHT)
        .map(|idx| {
            let (x, y) = (idx % WIDTH, idx / WIDTH);

            if (x0..x0 + 8).contains(&x) && (y0..y0 + 8).contains(&y) {
                200
            } else {
                (y / 6) as u8 * 16
            }
        })
        .collect()
}

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set-up the log and traces handler
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let frames = (0..24).map(frame).collect::<Vec<_>>();

    // Encode the frames into a movie-like atom tree
    let mut codec = Codec::new(Config {
        key_frame_interval: 8,
        ..Default::default()
    });
    let mut writer = Writer::new(Cursor::new(Vec::new()), Dialect::QuickTime)?;

    writer.open("ftyp".parse::<Tag>()?, Layout::Data)?;
    writer.write(b"qt  \x00\x00\x02\x00qt  ")?;
    writer.close()?;

    let mut sizes = Vec::new();
    writer.open("mdat".parse::<Tag>()?, Layout::Wide)?;
    for (n, pixels) in frames.iter().enumerate() {
        let prev = n.checked_sub(1).map(|prev| &frames[prev][..]);
        let flags = match prev {
            Some(prev) if prev == &pixels[..] => FrameFlags::SAME_DATA,
            _ => FrameFlags::NONE,
        };

        let Some(encoded) = codec.encode_frame(
            &Frame {
                width: WIDTH,
                height: HEIGHT,
                pixels: pixels.as_slice(),
            },
            prev,
            flags,
        )?
        else {
            continue;
        };

        writer.write(&encoded.data)?;
        sizes.push(encoded.data.len());
    }
    writer.close()?;

    let mut sink = writer.into_inner()?;
    tracing::info!(
        "Wrote {} frames in {} bytes",
        sizes.len(),
        sink.get_ref().len()
    );

    // Read the tree back and decode every frame
    sink.set_position(0);
    let records = Reader::new(Dialect::QuickTime).parse_all(&mut sink)?;
    let mdat = records
        .iter()
        .find_map(|record| record.find("mdat".parse().ok()?))
        .ok_or("no `mdat` atom")?;
    let Record::Data {
        body: Body::Raw(data),
        ..
    } = mdat
    else {
        return Err("`mdat` is not a data atom".into());
    };

    let mut decoder = Codec::new(Config::default());
    let mut out = vec![0u8; WIDTH * HEIGHT];
    let mut offset = 0;
    for (n, size) in sizes.iter().enumerate() {
        let key = decoder.decode_indexed(&data[offset..offset + size], WIDTH, HEIGHT, &mut out)?;
        offset += size;

        tracing::debug!("Frame {n} decoded, key frame: {key}");
        if out != frames[n] {
            return Err(format!("frame {n} does not match").into());
        }
    }

    // Store the last frame as an ILBM picture
    let mut palette = Palette::default();
    let green = (0..16u8).map(|g| g * 16).collect::<Vec<u8>>();
    palette.set_channels(&[0xff; 16], &green, &[0; 16]);

    let mut writer = Writer::new(Cursor::new(Vec::new()), Dialect::Iff)?;
    writer.open("ILBM".parse::<Tag>()?, Layout::Composite)?;

    writer.open("BMHD".parse::<Tag>()?, Layout::Data)?;
    let (width, height) = (WIDTH as u8, HEIGHT as u8);
    writer.write(&[
        0, width, 0, height, 0, 0, 0, 0, 8, 0, 1, 0, 0, 0, 1, 1, 0, width, 0, height,
    ])?;
    writer.close()?;

    writer.open("CMAP".parse::<Tag>()?, Layout::Data)?;
    writer.write(&Fields::ColorMap(ColorMap::from(&palette)).to_bytes()?)?;
    writer.close()?;

    writer.open("BODY".parse::<Tag>()?, Layout::Data)?;
    for row in out.chunks_exact(WIDTH) {
        writer.write(&byterun1::encode(row))?;
    }
    writer.close()?;

    let picture = writer.into_inner()?.into_inner();
    let records = Reader::new(Dialect::Iff).parse_all(&mut Cursor::new(&picture))?;
    let Some(Record::Data {
        body: Body::Raw(body),
        ..
    }) = records[0].find("BODY".parse()?)
    else {
        return Err("no `BODY` chunk".into());
    };

    let mut offset = 0;
    for row in out.chunks_exact(WIDTH) {
        let mut decoded = [0u8; WIDTH];
        offset += byterun1::decode(&body[offset..], &mut decoded)?;

        if decoded[..] != row[..] {
            return Err("ILBM body does not match".into());
        }
    }

    tracing::info!("Wrote a {} bytes ILBM picture", picture.len());

    Ok(())
}

//! WAV concatenation for reassembled requests.
//!
//! Chunks of one request are synthesized separately and stitched back
//! together here. All parts must share a single [`hound::WavSpec`].

use std::io::{self, Cursor};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

/// Failure to turn a set of audio chunks into one artifact.
#[derive(Debug, Error)]
pub enum AssemblyFault {
    /// Every chunk of the request failed or was empty.
    #[error("no audio to assemble")]
    NoAudio,

    #[error("chunk {chunk_id} is not valid WAV: {source}")]
    InvalidWav {
        chunk_id: u32,
        #[source]
        source: hound::Error,
    },

    /// A chunk's channel count, rate or sample format differs from the first.
    #[error("chunk {chunk_id} has format {found:?}, expected {expected:?}")]
    FormatMismatch {
        chunk_id: u32,
        expected: WavSpec,
        found: WavSpec,
    },

    #[error("failed to encode assembled WAV: {0}")]
    Write(#[source] hound::Error),

    #[error("failed to write audio artifact: {0}")]
    Io(#[from] io::Error),
}

/// Concatenate WAV chunks, in the order given, into one WAV file.
///
/// `parts` pairs each chunk id with its bytes. A single part is returned as is
/// without being parsed.
pub fn concat_wav(mut parts: Vec<(u32, Vec<u8>)>) -> Result<Vec<u8>, AssemblyFault> {
    parts.retain(|(_, bytes)| !bytes.is_empty());

    match parts.len() {
        0 => return Err(AssemblyFault::NoAudio),
        1 => return Ok(parts.swap_remove(0).1),
        _ => {}
    }

    let readers = parts
        .iter()
        .map(|(chunk_id, bytes)| {
            WavReader::new(Cursor::new(bytes.as_slice())).map_err(|source| {
                AssemblyFault::InvalidWav {
                    chunk_id: *chunk_id,
                    source,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let expected = readers[0].spec();
    for ((chunk_id, _), reader) in parts.iter().zip(&readers).skip(1) {
        let found = reader.spec();
        if found != expected {
            return Err(AssemblyFault::FormatMismatch {
                chunk_id: *chunk_id,
                expected,
                found,
            });
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, expected).map_err(AssemblyFault::Write)?;
        for ((chunk_id, _), reader) in parts.iter().zip(readers) {
            copy_samples(*chunk_id, reader, &mut writer)?;
        }
        writer.finalize().map_err(AssemblyFault::Write)?;
    }

    Ok(cursor.into_inner())
}

fn copy_samples<W>(
    chunk_id: u32,
    mut reader: WavReader<Cursor<&[u8]>>,
    writer: &mut WavWriter<W>,
) -> Result<(), AssemblyFault>
where
    W: io::Write + io::Seek,
{
    let invalid = |source| AssemblyFault::InvalidWav { chunk_id, source };

    match reader.spec().sample_format {
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                writer
                    .write_sample(sample.map_err(invalid)?)
                    .map_err(AssemblyFault::Write)?;
            }
        }
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                writer
                    .write_sample(sample.map_err(invalid)?)
                    .map_err(AssemblyFault::Write)?;
            }
        }
    }
    Ok(())
}

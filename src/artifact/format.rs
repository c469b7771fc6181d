use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

/// The magic number that identifies GGUF files
pub const GGUF_MAGIC: u32 = 0x46554747; // "GGUF" in ASCII

/// Local file header signature of a zip archive ("PK\x03\x04"), used by `.task` bundles
const ZIP_MAGIC: u32 = 0x04034b50;

/// FlatBuffer file identifier of a TFLite model, stored at offset 4
const TFLITE_IDENTIFIER: &[u8; 4] = b"TFL3";

/// Container format of a model artifact, detected from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// llama.cpp GGUF file with its header version
    Gguf { version: u32 },
    /// MediaPipe task bundle (zip container)
    TaskBundle,
    /// Bare TFLite flatbuffer
    Tflite,
    /// Anything else, including files too short to carry a header
    Unknown,
}

impl ArtifactFormat {
    /// Reads the header of the file at `path` and classifies it.
    ///
    /// Never fails: unreadable or truncated files are reported as `Unknown`.
    pub fn probe<P: AsRef<Path>>(path: P) -> Self {
        let Ok(mut file) = File::open(path) else {
            return ArtifactFormat::Unknown;
        };
        probe_reader(&mut file).unwrap_or(ArtifactFormat::Unknown)
    }

    pub fn is_gguf(&self) -> bool {
        matches!(self, ArtifactFormat::Gguf { .. })
    }
}

fn probe_reader<R: Read + Seek>(reader: &mut R) -> std::io::Result<ArtifactFormat> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic == GGUF_MAGIC {
        let version = reader.read_u32::<LittleEndian>()?;
        return Ok(ArtifactFormat::Gguf { version });
    }
    if magic == ZIP_MAGIC {
        return Ok(ArtifactFormat::TaskBundle);
    }

    reader.seek(SeekFrom::Start(4))?;
    let mut identifier = [0u8; 4];
    reader.read_exact(&mut identifier)?;
    if &identifier == TFLITE_IDENTIFIER {
        return Ok(ArtifactFormat::Tflite);
    }
    Ok(ArtifactFormat::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_probe_gguf_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&GGUF_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);

        let format = probe_reader(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(format, ArtifactFormat::Gguf { version: 3 });
        assert!(format.is_gguf());
    }

    #[test]
    fn test_probe_task_bundle_and_tflite() {
        let zip = [0x50, 0x4b, 0x03, 0x04, 0, 0, 0, 0];
        assert_eq!(probe_reader(&mut Cursor::new(zip.to_vec())).unwrap(), ArtifactFormat::TaskBundle);

        let tflite = [0x1c, 0, 0, 0, b'T', b'F', b'L', b'3', 0, 0];
        assert_eq!(probe_reader(&mut Cursor::new(tflite.to_vec())).unwrap(), ArtifactFormat::Tflite);
    }

    #[test]
    fn test_probe_short_or_missing_file_is_unknown() {
        assert!(probe_reader(&mut Cursor::new(vec![1u8, 2])).is_err());
        assert_eq!(ArtifactFormat::probe("/definitely/not/here.gguf"), ArtifactFormat::Unknown);
    }
}

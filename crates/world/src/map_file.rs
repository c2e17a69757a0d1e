//! Map persistence.
//!
//! Binary layout, all integers little-endian:
//!
//! ```text
//! u16         name length
//! [u8]        name (UTF-8)
//! 9 × f32     view position, direction, up
//! u32         chunk count
//! per chunk:
//!   3 × i16   chunk coordinate x, y, z
//!   stream    CHUNK_VOLUME voxels, each either
//!               [value, color]      value in 0..=254
//!               [255, u32 count]    `count` fully empty voxels
//! ```
//!
//! Fully empty chunks are not written.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::Chunk;
use crate::store::ChunkStore;
use crate::voxel::{Voxel, CHUNK_VOLUME};

/// Value byte introducing a run of empty voxels.
const RUN_MARKER: u8 = 255;

/// Shortest run of empty voxels worth encoding as a run.
const MIN_RUN: usize = 3;

/// Errors while reading or writing a map.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("map i/o: {0}")]
    Io(#[from] io::Error),

    #[error("map name is {0} bytes, longer than a u16 length allows")]
    NameTooLong(usize),

    #[error("map name is not valid UTF-8")]
    InvalidUtf8,

    #[error("chunk {coord:?} does not fit the 16-bit coordinate range")]
    ChunkOutOfRange { coord: IVec3 },

    #[error("voxel stream of chunk {coord:?} runs past the chunk volume")]
    VoxelOverflow { coord: IVec3 },

    #[error("empty-voxel run ends before its count")]
    TruncatedRun,
}

/// Camera placement stored with a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

/// Everything in a map file except its chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapHeader {
    pub name: String,
    pub view: MapView,
}

/// Outcome of loading a map from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum MapLoad {
    /// The file existed and was loaded into the store.
    Loaded(MapHeader),
    /// No file at that path; the caller starts a new map.
    New,
}

// ============================================================================
// Save
// ============================================================================

/// Write the header and every non-empty chunk of `store`.
pub fn save_map<W: Write>(store: &ChunkStore, header: &MapHeader, writer: &mut W) -> Result<(), MapError> {
    let name = header.name.as_bytes();
    let name_len = u16::try_from(name.len()).map_err(|_| MapError::NameTooLong(name.len()))?;
    writer.write_all(&name_len.to_le_bytes())?;
    writer.write_all(name)?;

    for v in [header.view.position, header.view.direction, header.view.up] {
        for component in v.to_array() {
            writer.write_all(&component.to_le_bytes())?;
        }
    }

    let chunks: Vec<&Chunk> = store.iter().filter(|chunk| !chunk.is_empty()).collect();
    writer.write_all(&(chunks.len() as u32).to_le_bytes())?;

    for chunk in &chunks {
        let coord = chunk.coord();
        for component in coord.to_array() {
            let component = i16::try_from(component).map_err(|_| MapError::ChunkOutOfRange { coord })?;
            writer.write_all(&component.to_le_bytes())?;
        }
        write_voxels(chunk.voxels(), writer)?;
    }

    Ok(())
}

fn write_voxels<W: Write>(voxels: &[Voxel], writer: &mut W) -> io::Result<()> {
    let mut index = 0;
    while index < voxels.len() {
        let run = voxels[index..].iter().take_while(|voxel| voxel.is_empty()).count();
        if run >= MIN_RUN {
            writer.write_all(&[RUN_MARKER])?;
            writer.write_all(&(run as u32).to_le_bytes())?;
            index += run;
            continue;
        }

        let voxel = voxels[index];
        writer.write_all(&[voxel.value.min(Voxel::MAX_VALUE), voxel.color])?;
        index += 1;
    }
    Ok(())
}

/// Save to a file, replacing it if present.
pub fn save_map_file(store: &ChunkStore, header: &MapHeader, path: impl AsRef<Path>) -> Result<(), MapError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    save_map(store, header, &mut writer)?;
    writer.flush()?;

    log::info!("saved map '{}' ({} chunks) to {}", header.name, store.len(), path.display());
    Ok(())
}

// ============================================================================
// Load
// ============================================================================

/// Replace the contents of `store` with a map read from `reader`.
///
/// The store is cleared first, so on error it holds whatever was read so far.
pub fn load_map<R: Read>(store: &mut ChunkStore, reader: &mut R) -> Result<MapHeader, MapError> {
    store.clear();

    let mut buf2 = [0u8; 2];
    reader.read_exact(&mut buf2)?;
    let mut name = vec![0u8; u16::from_le_bytes(buf2) as usize];
    reader.read_exact(&mut name)?;
    let name = String::from_utf8(name).map_err(|_| MapError::InvalidUtf8)?;

    let view = MapView {
        position: read_vec3(reader)?,
        direction: read_vec3(reader)?,
        up: read_vec3(reader)?,
    };

    let mut buf4 = [0u8; 4];
    reader.read_exact(&mut buf4)?;
    let chunk_count = u32::from_le_bytes(buf4);

    for _ in 0..chunk_count {
        let mut coord = [0i32; 3];
        for component in &mut coord {
            reader.read_exact(&mut buf2)?;
            *component = i16::from_le_bytes(buf2) as i32;
        }
        let coord = IVec3::from_array(coord);
        read_voxels(store.get_chunk(coord), reader)?;
    }

    Ok(MapHeader { name, view })
}

fn read_vec3<R: Read>(reader: &mut R) -> io::Result<Vec3> {
    let mut components = [0f32; 3];
    let mut buf4 = [0u8; 4];
    for component in &mut components {
        reader.read_exact(&mut buf4)?;
        *component = f32::from_le_bytes(buf4);
    }
    Ok(Vec3::from_array(components))
}

fn read_voxels<R: Read>(chunk: &mut Chunk, reader: &mut R) -> Result<(), MapError> {
    let coord = chunk.coord();
    let mut index = 0;
    let mut pair = [0u8; 2];

    while index < CHUNK_VOLUME {
        reader.read_exact(&mut pair)?;

        if pair[0] != RUN_MARKER {
            chunk.set_voxel(index, Voxel::new(pair[0], pair[1]));
            index += 1;
            continue;
        }

        // The color byte of a run marker is the first byte of the count
        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => MapError::TruncatedRun,
            _ => MapError::Io(err),
        })?;
        let run = u32::from_le_bytes([pair[1], rest[0], rest[1], rest[2]]) as usize;

        let end = index.checked_add(run).filter(|&end| end <= CHUNK_VOLUME);
        let Some(end) = end else {
            return Err(MapError::VoxelOverflow { coord });
        };
        for i in index..end {
            chunk.set_voxel(i, Voxel::EMPTY);
        }
        index = end;
    }

    Ok(())
}

/// Load from a file. A missing file is reported as [`MapLoad::New`] and
/// leaves the store untouched.
pub fn load_map_file(store: &mut ChunkStore, path: impl AsRef<Path>) -> Result<MapLoad, MapError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("no map at {}, starting a new one", path.display());
            return Ok(MapLoad::New);
        }
        Err(err) => return Err(err.into()),
    };

    let header = load_map(store, &mut BufReader::new(file))?;
    log::info!("loaded map '{}' ({} chunks) from {}", header.name, store.len(), path.display());
    Ok(MapLoad::Loaded(header))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> ChunkStore {
        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(0, 0, 0), Voxel::new(254, 3));
        store.set_voxel(IVec3::new(1, 0, 0), Voxel::new(10, 0));
        store.set_voxel(IVec3::new(5, 5, 5), Voxel::new(0, 7));
        store.set_voxel(IVec3::new(-20, 33, -1), Voxel::new(128, 200));
        store.set_voxel(IVec3::new(15, 15, 15), Voxel::new(1, 1));
        // Allocated but empty: must not be saved
        store.get_chunk(IVec3::new(9, 9, 9));
        store
    }

    fn header() -> MapHeader {
        MapHeader {
            name: "crater".to_string(),
            view: MapView {
                position: Vec3::new(1.0, 2.0, 3.0),
                direction: Vec3::X,
                up: Vec3::Y,
            },
        }
    }

    #[test]
    fn test_round_trip() {
        let store = sample_store();
        let mut bytes = Vec::new();
        save_map(&store, &header(), &mut bytes).unwrap();

        let mut loaded = ChunkStore::new();
        let read_header = load_map(&mut loaded, &mut bytes.as_slice()).unwrap();

        assert_eq!(read_header, header());
        assert_eq!(loaded.len(), 2, "empty chunk is skipped");
        for chunk in store.iter().filter(|chunk| !chunk.is_empty()) {
            let other = loaded.access_chunk(chunk.coord()).expect("chunk loaded");
            assert_eq!(chunk.voxels(), other.voxels());
        }
        assert!(loaded.access_chunk(IVec3::new(9, 9, 9)).is_none());
    }

    #[test]
    fn test_load_replaces_existing_chunks() {
        let mut bytes = Vec::new();
        save_map(&sample_store(), &header(), &mut bytes).unwrap();

        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::new(100, 0, 0), Voxel::new(50, 1));
        load_map(&mut store, &mut bytes.as_slice()).unwrap();

        assert_eq!(store.voxel_value(IVec3::new(100, 0, 0)), 0);
        assert_eq!(store.voxel(IVec3::ZERO), Voxel::new(254, 3));
    }

    #[test]
    fn test_run_past_chunk_volume() {
        let mut bytes = Vec::new();
        save_map(&ChunkStore::new(), &header(), &mut bytes).unwrap();

        // Patch chunk count to 1 and append a chunk with an oversized run
        let count_at = bytes.len() - 4;
        bytes[count_at..].copy_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        bytes.push(RUN_MARKER);
        bytes.extend_from_slice(&(CHUNK_VOLUME as u32 + 1).to_le_bytes());

        let mut store = ChunkStore::new();
        let err = load_map(&mut store, &mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, MapError::VoxelOverflow { coord } if coord == IVec3::ZERO));
    }

    #[test]
    fn test_truncated_run() {
        let mut bytes = Vec::new();
        save_map(&ChunkStore::new(), &header(), &mut bytes).unwrap();
        let count_at = bytes.len() - 4;
        bytes[count_at..].copy_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        bytes.extend_from_slice(&[RUN_MARKER, 4, 0]);

        let mut store = ChunkStore::new();
        let err = load_map(&mut store, &mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, MapError::TruncatedRun));
    }

    #[test]
    fn test_name_too_long() {
        let header = MapHeader {
            name: "x".repeat(u16::MAX as usize + 1),
            view: MapView::default(),
        };
        let err = save_map(&ChunkStore::new(), &header, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, MapError::NameTooLong(_)));
    }

    #[test]
    fn test_missing_file_is_new_map() {
        let path = std::env::temp_dir().join("voxterra-missing-map-test.bin");
        let _ = std::fs::remove_file(&path);

        let mut store = ChunkStore::new();
        store.set_voxel(IVec3::ZERO, Voxel::new(9, 9));
        let result = load_map_file(&mut store, &path).unwrap();

        assert_eq!(result, MapLoad::New);
        assert_eq!(store.voxel_value(IVec3::ZERO), 9);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("voxterra-map-test-{}.bin", std::process::id()));
        save_map_file(&sample_store(), &header(), &path).unwrap();

        let mut store = ChunkStore::new();
        let result = load_map_file(&mut store, &path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(result, MapLoad::Loaded(header()));
        assert_eq!(store.voxel(IVec3::new(-20, 33, -1)), Voxel::new(128, 200));
    }
}

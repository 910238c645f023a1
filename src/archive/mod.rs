//! Builtin library archives
//!
//! A library is stored with its function bodies out-of-line so that a
//! reader can load the symbol table cheaply and decode only the bodies it
//! actually needs.
//!
//! Layout (all integers little endian):
//! - magic `BIFA`
//! - `u32` format version
//! - `u32` header length, followed by the JSON header (module name,
//!   globals, and one entry per function with an optional body span)
//! - body section: each defined body is a JSON-encoded block list, located
//!   by its `(offset, len)` span relative to the start of the section

use crate::ir::{
    Block, BodyLoader, Body, CallingConv, Function, FunctionType, GlobalVariable, IntrinsicId,
    LazyBody, Linkage, Module,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::rc::Rc;

pub const ARCHIVE_MAGIC: &[u8; 4] = b"BIFA";
pub const ARCHIVE_VERSION: u32 = 1;

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveError {
    Io(String),
    BadMagic,
    UnsupportedVersion(u32),
    /// Input ends before the header does
    Truncated,
    /// Header JSON could not be decoded
    Header(String),
    /// A body span points past the end of the body section
    BodyOutOfRange { function: String },
    /// Only fully loaded modules can be written
    Unmaterialized(String),
    Encode(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Io(msg) => write!(f, "IO error: {}", msg),
            ArchiveError::BadMagic => write!(f, "not a builtin library archive"),
            ArchiveError::UnsupportedVersion(v) => write!(f, "unsupported archive version {}", v),
            ArchiveError::Truncated => write!(f, "archive is truncated"),
            ArchiveError::Header(msg) => write!(f, "malformed archive header: {}", msg),
            ArchiveError::BodyOutOfRange { function } => {
                write!(f, "body of '{}' lies outside the archive", function)
            }
            ArchiveError::Unmaterialized(name) => {
                write!(f, "cannot archive '{}': body is not materialized", name)
            }
            ArchiveError::Encode(msg) => write!(f, "failed to encode body: {}", msg),
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<std::io::Error> for ArchiveError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            ArchiveError::Truncated
        } else {
            ArchiveError::Io(error.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BodySpan {
    offset: u64,
    len: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionEntry {
    name: String,
    ty: FunctionType,
    #[serde(default)]
    conv: CallingConv,
    #[serde(default)]
    linkage: Linkage,
    #[serde(default)]
    dll_export: bool,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    intrinsic: Option<IntrinsicId>,
    #[serde(default)]
    params: Vec<String>,
    body: Option<BodySpan>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    name: String,
    globals: Vec<GlobalVariable>,
    functions: Vec<FunctionEntry>,
}

/// Loads one body from the shared body section
struct ArchivedBody {
    section: Rc<[u8]>,
    offset: usize,
    len: usize,
}

impl BodyLoader for ArchivedBody {
    fn load(&self) -> Result<Vec<Block>, String> {
        let bytes = &self.section[self.offset..self.offset + self.len];
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}

/// Serialize a fully materialized module into archive bytes.
pub fn write_archive(module: &Module) -> ArchiveResult<Vec<u8>> {
    let mut section = Vec::new();
    let mut functions = Vec::with_capacity(module.functions.len());

    for func in &module.functions {
        let body = match &func.body {
            Body::Declaration => None,
            Body::Materializable(_) => return Err(ArchiveError::Unmaterialized(func.name.clone())),
            Body::Defined(blocks) => {
                let encoded = serde_json::to_vec(blocks).map_err(|e| ArchiveError::Encode(e.to_string()))?;
                let span = BodySpan {
                    offset: section.len() as u64,
                    len: encoded.len() as u64,
                };
                section.extend_from_slice(&encoded);
                Some(span)
            }
        };
        functions.push(FunctionEntry {
            name: func.name.clone(),
            ty: func.ty.clone(),
            conv: func.conv,
            linkage: func.linkage,
            dll_export: func.dll_export,
            attributes: func.attributes.clone(),
            intrinsic: func.intrinsic,
            params: func.params.clone(),
            body,
        });
    }

    let header = ArchiveHeader {
        name: module.name.clone(),
        globals: module.globals.clone(),
        functions,
    };
    let header = serde_json::to_vec(&header).map_err(|e| ArchiveError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(12 + header.len() + section.len());
    out.extend_from_slice(ARCHIVE_MAGIC);
    out.write_u32::<LittleEndian>(ARCHIVE_VERSION)?;
    out.write_u32::<LittleEndian>(header.len() as u32)?;
    out.extend_from_slice(&header);
    out.extend_from_slice(&section);
    Ok(out)
}

/// Open archive bytes as a module whose defined functions are
/// materializable. No body is decoded here.
pub fn read_archive(bytes: &[u8]) -> ArchiveResult<Module> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if &magic != ARCHIVE_MAGIC {
        return Err(ArchiveError::BadMagic);
    }
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != ARCHIVE_VERSION {
        return Err(ArchiveError::UnsupportedVersion(version));
    }
    let header_len = cursor.read_u32::<LittleEndian>()? as usize;
    let header_start = cursor.position() as usize;
    let section_start = header_start
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or(ArchiveError::Truncated)?;

    let header: ArchiveHeader = serde_json::from_slice(&bytes[header_start..section_start])
        .map_err(|e| ArchiveError::Header(e.to_string()))?;
    let section: Rc<[u8]> = Rc::from(&bytes[section_start..]);

    let mut module = Module::new(header.name);
    for global in header.globals {
        module.add_global(global);
    }
    for entry in header.functions {
        let mut func = match entry.body {
            None => Function::declare(entry.name, entry.ty),
            Some(span) => {
                let offset = span.offset as usize;
                let len = span.len as usize;
                if offset.checked_add(len).map_or(true, |end| end > section.len()) {
                    return Err(ArchiveError::BodyOutOfRange { function: entry.name });
                }
                let loader = ArchivedBody {
                    section: Rc::clone(&section),
                    offset,
                    len,
                };
                Function::lazy(entry.name, entry.ty, LazyBody::new(Rc::new(loader)))
            }
        };
        func.conv = entry.conv;
        func.linkage = entry.linkage;
        func.dll_export = entry.dll_export;
        func.attributes = entry.attributes;
        func.intrinsic = entry.intrinsic;
        func.params = entry.params;
        module.add_function(func);
    }
    Ok(module)
}

pub fn load_archive(path: &Path) -> ArchiveResult<Module> {
    let bytes = fs::read(path)?;
    read_archive(&bytes)
}

pub fn save_archive(path: &Path, module: &Module) -> ArchiveResult<()> {
    let bytes = write_archive(module)?;
    fs::write(path, bytes)?;
    Ok(())
}

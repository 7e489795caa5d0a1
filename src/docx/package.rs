use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{Error, ReferenceKind};

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const STYLES_REL: &str = "/styles";
const FOOTNOTES_REL: &str = "/footnotes";

/// File extensions copied out of the media directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

/// Read access to an archive of named byte blobs.
pub trait Archive {
    fn entry_names(&self) -> Vec<String>;
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, Error>;
}

impl<R: Read + Seek> Archive for zip::ZipArchive<R> {
    fn entry_names(&self) -> Vec<String> {
        self.file_names().map(|s| s.to_string()).collect()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let mut entry = self
            .by_name(name)
            .map_err(|_| Error::InvalidPackage(format!("missing part {}", name)))?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// An archive held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name, data)),
        }
    }
}

impl Archive for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| Error::InvalidPackage(format!("missing part {}", name)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub rel_type: String,
    /// Package path for internal targets, the raw target for external ones.
    pub target: String,
    pub external: bool,
}

/// The relationship namespace of one part.
#[derive(Clone, Debug, Default)]
pub struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    pub fn parse(xml_content: &str, source_part: &str) -> Result<Self, Error> {
        let xml = roxmltree::Document::parse(strip_bom(xml_content))?;
        let base = part_dir(source_part);
        let mut by_id = HashMap::new();
        for node in xml.root_element().children() {
            if node.tag_name().name() != "Relationship" {
                continue;
            }
            let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
                continue;
            };
            let external = node.attribute("TargetMode") == Some("External");
            let target = if external {
                target.to_string()
            } else {
                resolve_target(base, target)
            };
            by_id.insert(
                id.to_string(),
                Relationship {
                    rel_type: node.attribute("Type").unwrap_or("").to_string(),
                    target,
                    external,
                },
            );
        }
        Ok(Relationships { by_id })
    }

    /// Package path of an internal relationship, failing on dangling ids.
    pub fn target(&self, id: &str) -> Result<&str, Error> {
        match self.by_id.get(id) {
            Some(rel) if !rel.external => Ok(&rel.target),
            _ => Err(Error::unresolved(ReferenceKind::Relationship, id)),
        }
    }

    pub fn find_by_type(&self, suffix: &str) -> Option<&Relationship> {
        let mut matches: Vec<(&String, &Relationship)> = self
            .by_id
            .iter()
            .filter(|(_, rel)| !rel.external && rel.rel_type.ends_with(suffix))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        matches.first().map(|(_, rel)| *rel)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// Resolves a relationship target against the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{}/{}", base_dir, target),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    log::warn!("Relationship target {} escapes the package root", target);
                }
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// `word/footnotes.xml` → `word/_rels/footnotes.xml.rels`
pub(crate) fn part_rels_path(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// File name component of a package path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, f)| f).unwrap_or(path)
}

fn decode_part(name: &str, data: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(data)
        .map_err(|_| Error::InvalidPackage(format!("part {} is not valid UTF-8", name)))
}

#[derive(Debug)]
pub struct Part {
    pub path: String,
    pub xml: String,
    pub rels: Relationships,
}

/// The parts of a DOCX package the converter needs.
#[derive(Debug)]
pub struct Package {
    pub document: Part,
    pub styles: Option<String>,
    pub footnotes: Option<Part>,
    /// Whitelisted images from the media directory, keyed by file name.
    pub media: HashMap<String, Vec<u8>>,
}

impl Package {
    pub fn open<A: Archive + ?Sized>(archive: &mut A) -> Result<Self, Error> {
        let names = archive.entry_names();
        let has = |n: &str| names.iter().any(|e| e == n);

        if !has("_rels/.rels") {
            return Err(Error::InvalidPackage(
                "missing _rels/.rels (is this a DOCX file?)".into(),
            ));
        }
        let root_rels = decode_part("_rels/.rels", archive.read_entry("_rels/.rels")?)?;
        let root_rels = Relationships::parse(&root_rels, "")?;
        let document_path = root_rels
            .find_by_type(OFFICE_DOCUMENT_REL)
            .map(|r| r.target.clone())
            .ok_or_else(|| Error::InvalidPackage("no officeDocument relationship".into()))?;
        if !has(&document_path) {
            return Err(Error::InvalidPackage(format!(
                "missing main document part {}",
                document_path
            )));
        }
        let document = read_part(archive, &names, &document_path)?;
        log::debug!(
            "Main document {} with {} relationships",
            document.path,
            document.rels.len()
        );

        let styles = match document.rels.find_by_type(STYLES_REL) {
            Some(rel) if has(&rel.target) => {
                Some(decode_part(&rel.target, archive.read_entry(&rel.target)?)?)
            }
            _ => None,
        };

        let footnotes = match document.rels.find_by_type(FOOTNOTES_REL) {
            Some(rel) if has(&rel.target) => Some(read_part(archive, &names, &rel.target)?),
            _ => None,
        };

        let media_dir = format!("{}/media/", part_dir(&document_path));
        let media_dir = media_dir.trim_start_matches('/');
        let mut media = HashMap::new();
        for name in names.iter().filter(|n| n.starts_with(media_dir)) {
            let file = file_name(name);
            let ext = file
                .rsplit_once('.')
                .map(|(_, e)| e.to_ascii_lowercase())
                .unwrap_or_default();
            if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                log::warn!("Skipping unsupported media entry {}", name);
                continue;
            }
            media.insert(file.to_string(), archive.read_entry(name)?);
        }
        log::debug!(
            "Package: styles={} footnotes={} media={}",
            styles.is_some(),
            footnotes.is_some(),
            media.len()
        );

        Ok(Package {
            document,
            styles,
            footnotes,
            media,
        })
    }
}

fn read_part<A: Archive + ?Sized>(
    archive: &mut A,
    names: &[String],
    path: &str,
) -> Result<Part, Error> {
    let xml = decode_part(path, archive.read_entry(path)?)?;
    let rels_path = part_rels_path(path);
    let rels = if names.iter().any(|n| *n == rels_path) {
        let text = decode_part(&rels_path, archive.read_entry(&rels_path)?)?;
        Relationships::parse(&text, path)?
    } else {
        Relationships::default()
    };
    Ok(Part {
        path: path.to_string(),
        xml,
        rels,
    })
}

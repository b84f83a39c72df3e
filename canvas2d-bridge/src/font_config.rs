//! Font configuration for text drawing.
//!
//! [`FontConfig`] is a plain description of where fonts come from. Resolving it
//! scans the system and loads files once; the resulting [`ResolvedFontConfig`]
//! can seed any number of contexts.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FontConfig {
    /// Font files supplied as bytes.
    pub custom_fonts: Vec<CustomFont>,
    /// Concrete families behind the generic CSS names.
    pub generic_families: GenericFamilyMap,
    /// Whether to load system fonts (default: true).
    pub load_system_fonts: bool,
    /// Additional directories to scan for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Whether glyph outlines are hinted (default: false).
    pub hinting_enabled: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            custom_fonts: Vec::new(),
            generic_families: GenericFamilyMap::defaults(),
            load_system_fonts: true,
            font_dirs: Vec::new(),
            hinting_enabled: false,
        }
    }
}

impl FontConfig {
    /// A configuration that loads nothing from the system.
    pub fn empty() -> Self {
        Self {
            load_system_fonts: false,
            ..Self::default()
        }
    }

    pub fn with_font(mut self, font: CustomFont) -> Self {
        self.custom_fonts.push(font);
        self
    }

    /// Resolve this configuration into a font database.
    pub fn resolve(&self) -> ResolvedFontConfig {
        ResolvedFontConfig::new(self)
    }
}

/// Raw font file data (TTF/OTF/TTC) and an optional family override.
#[derive(Clone, Debug)]
pub struct CustomFont {
    pub data: Arc<Vec<u8>>,
    /// Registered family name. `None` keeps the name from the font's name table.
    pub family_name: Option<String>,
}

impl CustomFont {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            family_name: None,
        }
    }

    pub fn with_family_name(mut self, name: impl Into<String>) -> Self {
        self.family_name = Some(name.into());
        self
    }
}

/// Concrete families for each generic CSS family, in priority order.
#[derive(Clone, Debug, Default)]
pub struct GenericFamilyMap {
    pub serif: Vec<String>,
    pub sans_serif: Vec<String>,
    pub monospace: Vec<String>,
    pub cursive: Vec<String>,
    pub fantasy: Vec<String>,
}

impl GenericFamilyMap {
    /// Preference lists close to what desktop browsers pick.
    pub fn defaults() -> Self {
        Self {
            sans_serif: vec!["Arial".into(), "Helvetica".into(), "Liberation Sans".into()],
            monospace: vec![
                "Courier New".into(),
                "Courier".into(),
                "Liberation Mono".into(),
                "DejaVu Sans Mono".into(),
            ],
            serif: vec![
                "Times New Roman".into(),
                "Times".into(),
                "Liberation Serif".into(),
                "DejaVu Serif".into(),
            ],
            cursive: vec!["Comic Sans MS".into(), "Apple Chancery".into()],
            fantasy: vec!["Impact".into(), "Papyrus".into()],
        }
    }
}

/// A [`FontConfig`] resolved into a font database.
///
/// Cloning copies the database in memory without touching the filesystem.
/// Pass it to [`Canvas2dContext::with_resolved`](crate::Canvas2dContext::with_resolved).
#[derive(Clone)]
pub struct ResolvedFontConfig {
    pub(crate) fontdb: fontdb::Database,
    pub(crate) hinting_enabled: bool,
}

impl std::fmt::Debug for ResolvedFontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFontConfig")
            .field("faces", &self.fontdb.len())
            .field("hinting_enabled", &self.hinting_enabled)
            .finish()
    }
}

impl ResolvedFontConfig {
    pub fn new(config: &FontConfig) -> Self {
        Self {
            fontdb: font_config_to_fontdb(config),
            hinting_enabled: config.hinting_enabled,
        }
    }

    /// Number of font faces available.
    pub fn face_count(&self) -> usize {
        self.fontdb.len()
    }
}

/// Build a [`fontdb::Database`] from `config`.
pub fn font_config_to_fontdb(config: &FontConfig) -> fontdb::Database {
    let mut db = fontdb::Database::new();

    if config.load_system_fonts {
        db.load_system_fonts();
    }

    for dir in &config.font_dirs {
        db.load_fonts_dir(dir);
    }

    for font in &config.custom_fonts {
        let ids = db.load_font_source(fontdb::Source::Binary(font.data.clone()));
        if ids.is_empty() {
            log::warn!(target: "canvas", "custom font data contained no usable faces");
        }
        if let Some(family) = &font.family_name {
            for id in ids {
                rename_face(&mut db, id, family);
            }
        }
    }

    apply_generic_families(&mut db, &config.generic_families);
    log::debug!(target: "canvas", "font database ready with {} faces", db.len());

    db
}

/// Re-register a face under `family`.
fn rename_face(db: &mut fontdb::Database, id: fontdb::ID, family: &str) {
    let Some(mut info) = db.face(id).cloned() else {
        return;
    };
    db.remove_face(id);
    info.families = vec![(family.to_string(), fontdb::Language::English_UnitedStates)];
    db.push_face_info(info);
}

/// Point each generic family at the first listed family that is installed.
fn apply_generic_families(db: &mut fontdb::Database, families: &GenericFamilyMap) {
    let available: HashSet<String> = db
        .faces()
        .flat_map(|face| face.families.iter().map(|(family, _)| family.clone()))
        .collect();
    let pick = |candidates: &[String]| {
        candidates
            .iter()
            .find(|family| available.contains(*family))
            .cloned()
    };

    if let Some(family) = pick(&families.sans_serif) {
        db.set_sans_serif_family(family);
    }
    if let Some(family) = pick(&families.monospace) {
        db.set_monospace_family(family);
    }
    if let Some(family) = pick(&families.serif) {
        db.set_serif_family(family);
    }
    if let Some(family) = pick(&families.cursive) {
        db.set_cursive_family(family);
    }
    if let Some(family) = pick(&families.fantasy) {
        db.set_fantasy_family(family);
    }
}

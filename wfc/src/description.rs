use crate::biome::Biome;
use crate::error::ConfigurationError;
use hashbrown::HashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str::{self, FromStr};

/// How a tile's image behaves under rotation and reflection, which decides
/// how many distinct states it expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Symmetry {
    #[default]
    X,
    I,
    D,
    L,
    T,
}

impl Symmetry {
    pub fn cardinality(self) -> u32 {
        match self {
            Symmetry::X => 1,
            Symmetry::I | Symmetry::D => 2,
            Symmetry::L | Symmetry::T => 4,
        }
    }

    /// Variant index after a quarter turn.
    pub fn rotate(self, i: u32) -> u32 {
        match self {
            Symmetry::X => i,
            Symmetry::I | Symmetry::D => 1 - i,
            Symmetry::L | Symmetry::T => (i + 1) % 4,
        }
    }

    /// Variant index after a mirror.
    pub fn reflect(self, i: u32) -> u32 {
        match self {
            Symmetry::X | Symmetry::I => i,
            Symmetry::D => 1 - i,
            Symmetry::L => {
                if i % 2 == 0 {
                    i + 1
                } else {
                    i - 1
                }
            }
            Symmetry::T => {
                if i % 2 == 0 {
                    i
                } else {
                    4 - i
                }
            }
        }
    }
}

impl FromStr for Symmetry {
    type Err = ConfigurationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Symmetry::X),
            "I" => Ok(Symmetry::I),
            "D" | "\\" => Ok(Symmetry::D),
            "L" => Ok(Symmetry::L),
            "T" => Ok(Symmetry::T),
            other => Err(ConfigurationError::UnknownSymmetry(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileDescription {
    pub name: String,
    pub symmetry: Symmetry,
    pub weight: f64,
    pub biome: Option<Biome>,
}

impl TileDescription {
    pub fn new(name: impl Into<String>, symmetry: Symmetry) -> Self {
        Self {
            name: name.into(),
            symmetry,
            weight: 1.0,
            biome: None,
        }
    }
    pub fn with_weight(self, weight: f64) -> Self {
        Self { weight, ..self }
    }
    pub fn with_biome(self, biome: Biome) -> Self {
        Self {
            biome: Some(biome),
            ..self
        }
    }
}

/// A tile name with an optional variant suffix, e.g. `"Coast 1"`. The
/// variant indexes the tile's symmetry action (0..8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRef {
    pub name: String,
    pub variant: u32,
}

impl TileRef {
    pub fn new(name: impl Into<String>, variant: u32) -> Self {
        Self {
            name: name.into(),
            variant,
        }
    }
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some((name, suffix)) = s.rsplit_once(char::is_whitespace) {
            if let Ok(variant) = suffix.parse() {
                return Self::new(name.trim_end(), variant);
            }
        }
        Self::new(s, 0)
    }
}

/// `left` may appear immediately to the left of `right`. The compiler
/// derives the other three directions from the tiles' symmetries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourRule {
    pub left: TileRef,
    pub right: TileRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetDescription {
    pub name: String,
    pub tiles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilesetDescription {
    pub tiles: Vec<TileDescription>,
    pub neighbours: Vec<NeighbourRule>,
    pub subsets: Vec<SubsetDescription>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Tiles,
    Neighbours,
    Subsets,
}

fn attributes(e: &BytesStart) -> Result<HashMap<String, String>, ConfigurationError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        let value = str::from_utf8(&attr.value)?.to_string();
        map.insert(key, value);
    }
    Ok(map)
}

fn required(
    attributes: &mut HashMap<String, String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<String, ConfigurationError> {
    attributes
        .remove(attribute)
        .ok_or(ConfigurationError::MissingAttribute { element, attribute })
}

fn parse_tile(e: &BytesStart) -> Result<TileDescription, ConfigurationError> {
    let mut attributes = attributes(e)?;
    let name = required(&mut attributes, "tile", "name")?;
    let symmetry = match attributes.remove("symmetry") {
        Some(symmetry) => symmetry.parse()?,
        None => Symmetry::X,
    };
    let weight = match attributes.remove("weight") {
        Some(weight) => weight
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidAttribute {
                attribute: "weight",
                value: weight,
            })?,
        None => 1.0,
    };
    let biome = match attributes.remove("biome") {
        Some(biome) => Some(biome.parse()?),
        None => None,
    };
    Ok(TileDescription {
        name,
        symmetry,
        weight,
        biome,
    })
}

fn parse_neighbour(e: &BytesStart) -> Result<NeighbourRule, ConfigurationError> {
    let mut attributes = attributes(e)?;
    let left = required(&mut attributes, "neighbor", "left")?;
    let right = required(&mut attributes, "neighbor", "right")?;
    Ok(NeighbourRule {
        left: TileRef::parse(&left),
        right: TileRef::parse(&right),
    })
}

impl TilesetDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(mut self, tile: TileDescription) -> Self {
        self.tiles.push(tile);
        self
    }

    pub fn neighbour(mut self, left: &str, right: &str) -> Self {
        self.neighbours.push(NeighbourRule {
            left: TileRef::parse(left),
            right: TileRef::parse(right),
        });
        self
    }

    pub fn subset<S: Into<String>>(
        mut self,
        name: &str,
        tiles: impl IntoIterator<Item = S>,
    ) -> Self {
        self.subsets.push(SubsetDescription {
            name: name.to_string(),
            tiles: tiles.into_iter().map(Into::into).collect(),
        });
        self
    }

    // Tiles, rules and subset members may be written self-closing or with an
    // end tag.
    fn add_entry(
        &mut self,
        section: Section,
        subset: Option<&mut SubsetDescription>,
        e: &BytesStart,
    ) -> Result<(), ConfigurationError> {
        match (section, e.name().as_ref()) {
            (Section::Tiles, b"tile") => self.tiles.push(parse_tile(e)?),
            (Section::Neighbours, b"neighbor") | (Section::Neighbours, b"neighbour") => {
                self.neighbours.push(parse_neighbour(e)?)
            }
            (Section::Subsets, b"tile") => {
                let name = required(&mut attributes(e)?, "tile", "name")?;
                if let Some(subset) = subset {
                    subset.tiles.push(name);
                }
            }
            _ => (),
        }
        Ok(())
    }

    /// Parses a tileset document of the form
    /// `<set><tiles/><neighbors/><subsets/></set>`.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigurationError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut description = Self::default();
        let mut section = Section::Other;
        let mut current_subset: Option<SubsetDescription> = None;
        loop {
            match reader.read_event()? {
                Event::Start(ref e) => match (section, e.name().as_ref()) {
                    (_, b"tiles") => section = Section::Tiles,
                    (_, b"neighbors") | (_, b"neighbours") => section = Section::Neighbours,
                    (_, b"subsets") => section = Section::Subsets,
                    (Section::Subsets, b"subset") => {
                        let name = required(&mut attributes(e)?, "subset", "name")?;
                        current_subset = Some(SubsetDescription {
                            name,
                            tiles: Vec::new(),
                        });
                    }
                    _ => description.add_entry(section, current_subset.as_mut(), e)?,
                },
                Event::Empty(ref e) => match (section, e.name().as_ref()) {
                    (Section::Subsets, b"subset") => {
                        let name = required(&mut attributes(e)?, "subset", "name")?;
                        description.subsets.push(SubsetDescription {
                            name,
                            tiles: Vec::new(),
                        });
                    }
                    _ => description.add_entry(section, current_subset.as_mut(), e)?,
                },
                Event::End(ref e) => match e.name().as_ref() {
                    b"tiles" | b"neighbors" | b"neighbours" | b"subsets" => {
                        section = Section::Other
                    }
                    b"subset" => {
                        if let Some(subset) = current_subset.take() {
                            description.subsets.push(subset);
                        }
                    }
                    _ => (),
                },
                Event::Eof => break,
                _ => (),
            }
        }
        Ok(description)
    }
}

use serde::Serialize;

use crate::model::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderCategory {
    Road = 0,
    Waterway = 1,
    Border = 2,
    PopulatedPlace = 3,
    Railway = 4,
    GeofeatureForest = 5,
    GeofeatureResidential = 6,
    GeofeaturePlain = 7,
    GeofeatureMountains = 8,
    GeofeatureDesert = 9,
    GeofeatureWater = 10,
    Unknown = 11,
}

impl RenderCategory {
    pub const ALL: [RenderCategory; 12] = [
        RenderCategory::Road,
        RenderCategory::Waterway,
        RenderCategory::Border,
        RenderCategory::PopulatedPlace,
        RenderCategory::Railway,
        RenderCategory::GeofeatureForest,
        RenderCategory::GeofeatureResidential,
        RenderCategory::GeofeaturePlain,
        RenderCategory::GeofeatureMountains,
        RenderCategory::GeofeatureDesert,
        RenderCategory::GeofeatureWater,
        RenderCategory::Unknown,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderCategory::Road => "road",
            RenderCategory::Waterway => "waterway",
            RenderCategory::Border => "border",
            RenderCategory::PopulatedPlace => "populated_place",
            RenderCategory::Railway => "railway",
            RenderCategory::GeofeatureForest => "geofeature_forest",
            RenderCategory::GeofeatureResidential => "geofeature_residential",
            RenderCategory::GeofeaturePlain => "geofeature_plain",
            RenderCategory::GeofeatureMountains => "geofeature_mountains",
            RenderCategory::GeofeatureDesert => "geofeature_desert",
            RenderCategory::GeofeatureWater => "geofeature_water",
            RenderCategory::Unknown => "unknown",
        }
    }
}

pub const HIGHWAY_TYPES: &[&str] = &[
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "road",
];

#[derive(Debug, Clone, Copy)]
enum KeyMatch {
    Exact(&'static str),
    Prefix(&'static str),
}

#[derive(Debug, Clone, Copy)]
enum ValueMatch {
    Any,
    Prefix(&'static [&'static str]),
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct Clause {
    key: KeyMatch,
    value: ValueMatch,
}

#[derive(Debug)]
struct Rule {
    category: RenderCategory,
    any_of: &'static [&'static [Clause]],
    consumes: &'static [&'static str],
}

macro_rules! clause {
    ($key:expr, $value:expr $(,)?) => {
        Clause {
            key: $key,
            value: $value,
        }
    };
}

const RULES: &[Rule] = &[
    Rule {
        category: RenderCategory::Road,
        any_of: &[&[clause!(KeyMatch::Exact("highway"), ValueMatch::Prefix(HIGHWAY_TYPES))]],
        consumes: &["highway"],
    },
    Rule {
        category: RenderCategory::Waterway,
        any_of: &[&[clause!(KeyMatch::Prefix("water"), ValueMatch::Any)]],
        consumes: &["water"],
    },
    Rule {
        category: RenderCategory::Border,
        any_of: &[&[
            clause!(KeyMatch::Prefix("boundary"), ValueMatch::Prefix(&["administrative"])),
            clause!(KeyMatch::Prefix("admin_level"), ValueMatch::OneOf(&["2"])),
        ]],
        consumes: &["boundary", "admin_level"],
    },
    Rule {
        category: RenderCategory::PopulatedPlace,
        any_of: &[&[clause!(
            KeyMatch::Prefix("place"),
            ValueMatch::Prefix(&["city", "town", "locality", "hamlet"]),
        )]],
        consumes: &["place"],
    },
    Rule {
        category: RenderCategory::Railway,
        any_of: &[&[clause!(KeyMatch::Prefix("railway"), ValueMatch::Any)]],
        consumes: &["railway"],
    },
    Rule {
        category: RenderCategory::GeofeatureForest,
        any_of: &[
            &[clause!(KeyMatch::Prefix("boundary"), ValueMatch::Prefix(&["forest"]))],
            &[clause!(KeyMatch::Prefix("landuse"), ValueMatch::Prefix(&["forest", "orchard"]))],
            &[clause!(KeyMatch::Exact("natural"), ValueMatch::OneOf(&["wood", "tree_row"]))],
        ],
        consumes: &["landuse", "natural"],
    },
    Rule {
        category: RenderCategory::GeofeatureResidential,
        any_of: &[
            &[clause!(
                KeyMatch::Prefix("landuse"),
                ValueMatch::Prefix(&[
                    "residential",
                    "cemetery",
                    "industrial",
                    "commercial",
                    "square",
                    "construction",
                    "military",
                    "quarry",
                    "brownfield",
                ]),
            )],
            &[clause!(KeyMatch::Prefix("building"), ValueMatch::Any)],
            &[clause!(KeyMatch::Prefix("leisure"), ValueMatch::Any)],
            &[clause!(KeyMatch::Prefix("amenity"), ValueMatch::Any)],
        ],
        consumes: &["landuse", "building", "leisure", "amenity"],
    },
    Rule {
        category: RenderCategory::GeofeaturePlain,
        any_of: &[
            &[clause!(
                KeyMatch::Prefix("landuse"),
                ValueMatch::Prefix(&[
                    "farm",
                    "meadow",
                    "grass",
                    "greenfield",
                    "recreation_ground",
                    "winter_sports",
                    "allotments",
                ]),
            )],
            &[clause!(
                KeyMatch::Exact("natural"),
                ValueMatch::OneOf(&["fell", "grassland", "heath", "moor", "scrub", "wetland"]),
            )],
        ],
        consumes: &["landuse", "natural"],
    },
    Rule {
        category: RenderCategory::GeofeatureMountains,
        any_of: &[&[clause!(
            KeyMatch::Exact("natural"),
            ValueMatch::OneOf(&["bare_rock", "rock", "scree"]),
        )]],
        consumes: &["natural"],
    },
    Rule {
        category: RenderCategory::GeofeatureDesert,
        any_of: &[&[clause!(KeyMatch::Exact("natural"), ValueMatch::OneOf(&["beach", "sand"]))]],
        consumes: &["natural"],
    },
    Rule {
        category: RenderCategory::GeofeatureWater,
        any_of: &[
            &[clause!(KeyMatch::Prefix("landuse"), ValueMatch::Prefix(&["reservoir", "basin"]))],
            &[clause!(KeyMatch::Exact("natural"), ValueMatch::OneOf(&["water"]))],
        ],
        consumes: &["landuse", "natural"],
    },
];

pub fn classify(mut tags: Vec<Tag>) -> (RenderCategory, Vec<Tag>) {
    for rule in RULES {
        if rule.matches(&tags) {
            for key in rule.consumes {
                remove_first(&mut tags, key);
            }
            return (rule.category, tags);
        }
    }
    (RenderCategory::Unknown, tags)
}

pub fn category_of(tags: &[Tag]) -> RenderCategory {
    RULES
        .iter()
        .find(|rule| rule.matches(tags))
        .map(|rule| rule.category)
        .unwrap_or(RenderCategory::Unknown)
}

impl Rule {
    fn matches(&self, tags: &[Tag]) -> bool {
        self.any_of
            .iter()
            .any(|all_of| all_of.iter().all(|clause| clause.matches(tags)))
    }
}

impl Clause {
    fn matches(&self, tags: &[Tag]) -> bool {
        tags.iter()
            .any(|(key, value)| self.key.matches(key) && self.value.matches(value))
    }
}

impl KeyMatch {
    fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatch::Exact(expected) => key.eq_ignore_ascii_case(expected),
            KeyMatch::Prefix(prefix) => starts_with_ignore_case(key, prefix),
        }
    }
}

impl ValueMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatch::Any => true,
            ValueMatch::Prefix(prefixes) => prefixes
                .iter()
                .any(|prefix| starts_with_ignore_case(value, prefix)),
            ValueMatch::OneOf(options) => options
                .iter()
                .any(|option| value.eq_ignore_ascii_case(option)),
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let text = text.as_bytes();
    let prefix = prefix.as_bytes();
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn remove_first(tags: &mut Vec<Tag>, key: &str) {
    if let Some(index) = tags.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)) {
        tags.remove(index);
    }
}

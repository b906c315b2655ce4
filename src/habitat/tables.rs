//! Habitat Indicator Tables
//!
//! Static evidence used by the habitat scorer. Each habitat carries:
//! - name keywords: genus/family fragments matched against scientific names
//! - taxonomic indicators: orders/families that match a lineage exactly
//! - functional groups: expected values of the registry "functional group" attribute
//!
//! Keywords are lowercase; matching is substring on the lowercased name.

use crate::models::HabitatType;

/// Indicator evidence for one habitat
#[derive(Debug, Clone)]
pub struct HabitatProfile {
    pub habitat: HabitatType,
    pub name_keywords: &'static [&'static str],
    pub taxonomic_indicators: &'static [&'static str],
    pub functional_groups: &'static [&'static str],
}

// ============================================================================
// EMBEDDED INDICATOR DATA
// ============================================================================

pub static HABITAT_PROFILES: &[HabitatProfile] = &[
    HabitatProfile {
        habitat: HabitatType::CoralReef,
        name_keywords: &[
            "acropora", "pocillopora", "porites", "montipora", "orbicella", "diploria",
            "pseudodiploria", "millepora", "favia", "dipsastraea", "goniopora", "stylophora",
            "siderastrea", "agaricia", "colpophyllia", "seriatopora", "chaetodon",
            "scarus", "sparisoma", "acanthurus", "pomacentrus", "amphiprion", "tridacna",
        ],
        taxonomic_indicators: &[
            "Scleractinia", "Acroporidae", "Pocilloporidae", "Poritidae", "Merulinidae",
            "Agariciidae", "Milleporidae", "Chaetodontidae", "Scaridae", "Pomacentridae",
        ],
        functional_groups: &["benthos", "reef-associated"],
    },
    HabitatProfile {
        habitat: HabitatType::SeagrassMeadow,
        name_keywords: &[
            "posidonia", "zostera", "thalassia", "halodule", "cymodocea", "syringodium",
            "halophila", "enhalus", "amphibolis", "hippocampus", "dugong", "chelonia mydas",
        ],
        taxonomic_indicators: &[
            "Alismatales", "Posidoniaceae", "Zosteraceae", "Cymodoceaceae", "Hydrocharitaceae",
            "Dugongidae", "Syngnathidae",
        ],
        functional_groups: &["macrophyte", "benthos"],
    },
    HabitatProfile {
        habitat: HabitatType::MangroveForest,
        name_keywords: &[
            "rhizophora", "avicennia", "laguncularia", "bruguiera", "sonneratia", "ceriops",
            "conocarpus", "kandelia", "nypa", "periophthalmus", "scylla", "uca ",
        ],
        taxonomic_indicators: &[
            "Rhizophoraceae", "Acanthaceae", "Combretaceae", "Lythraceae", "Oxudercidae",
        ],
        functional_groups: &["macrophyte", "benthos"],
    },
    HabitatProfile {
        habitat: HabitatType::KelpForest,
        name_keywords: &[
            "macrocystis", "laminaria", "nereocystis", "ecklonia", "saccharina", "lessonia",
            "undaria", "alaria", "pterygophora", "strongylocentrotus", "enhydra",
        ],
        taxonomic_indicators: &["Laminariales", "Laminariaceae", "Lessoniaceae", "Alariaceae"],
        functional_groups: &["macroalgae", "benthos"],
    },
    HabitatProfile {
        habitat: HabitatType::SaltMarsh,
        name_keywords: &[
            "spartina", "salicornia", "sarcocornia", "juncus", "puccinellia", "limonium",
            "suaeda", "distichlis", "halimione",
        ],
        taxonomic_indicators: &["Amaranthaceae", "Juncaceae", "Plumbaginaceae"],
        functional_groups: &["macrophyte"],
    },
    HabitatProfile {
        habitat: HabitatType::RockyReef,
        name_keywords: &[
            "epinephelus", "mycteroperca", "sebastes", "diplodus", "paracentrotus",
            "palinurus", "panulirus", "homarus", "octopus", "mytilus", "patella",
        ],
        taxonomic_indicators: &[
            "Serranidae", "Sebastidae", "Sparidae", "Palinuridae", "Parechinidae",
        ],
        functional_groups: &["benthos", "demersal"],
    },
    HabitatProfile {
        habitat: HabitatType::Seamount,
        name_keywords: &[
            "lophelia", "desmophyllum", "madrepora", "hoplostethus", "beryx", "pseudopentaceros",
            "corallium", "paragorgia",
        ],
        taxonomic_indicators: &["Trachichthyidae", "Berycidae", "Caryophylliidae", "Coralliidae"],
        functional_groups: &["bathypelagic", "deep-sea"],
    },
    HabitatProfile {
        habitat: HabitatType::OpenOcean,
        name_keywords: &[
            "thunnus", "katsuwonus", "xiphias", "prionace", "carcharhinus", "mobula",
            "balaenoptera", "megaptera", "physeter", "stenella", "coryphaena",
        ],
        taxonomic_indicators: &[
            "Scombridae", "Xiphiidae", "Balaenopteridae", "Delphinidae", "Carcharhinidae",
        ],
        functional_groups: &["nekton", "pelagic", "zooplankton", "phytoplankton"],
    },
];

pub fn profile_for(habitat: HabitatType) -> Option<&'static HabitatProfile> {
    HABITAT_PROFILES.iter().find(|p| p.habitat == habitat)
}

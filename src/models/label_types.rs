use std::collections::HashMap;

/// Number of leaf conditions the classifier distinguishes.
pub const NUM_CLASSES: usize = 10;

/// Number of ranked entries reported per prediction.
pub const TOP_K: usize = 3;

/// Every label a model bundle may declare, in the order the training tooling exports them.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___healthy",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
];

// Verbose training label -> key used by clients.
const LABEL_REMAP: [(&str, &str); NUM_CLASSES] = [
    ("Tomato___Bacterial_spot", "Bacterial_spot"),
    ("Tomato___Early_blight", "Early_blight"),
    ("Tomato___Late_blight", "Late_blight"),
    ("Tomato___Leaf_Mold", "Leaf_Mold"),
    ("Tomato___Septoria_leaf_spot", "Septoria_leaf_spot"),
    ("Tomato___Spider_mites Two-spotted_spider_mite", "Spider_mites"),
    ("Tomato___Target_Spot", "Target_Spot"),
    ("Tomato___Tomato_Yellow_Leaf_Curl_Virus", "Tomato_Yellow_Leaf_Curl_Virus"),
    ("Tomato___Tomato_mosaic_virus", "Tomato_mosaic_virus"),
    ("Tomato___healthy", "healthy"),
];

pub fn is_known_label(label: &str) -> bool {
    CLASS_NAMES.contains(&label)
}

/// Presentation-layer aliasing of verbose labels to short external keys.
#[derive(Debug, Clone)]
pub struct LabelRemap {
    table: HashMap<&'static str, &'static str>,
}

impl LabelRemap {
    /// The fixed tomato label table.
    pub fn standard() -> Self {
        Self {
            table: LABEL_REMAP.iter().copied().collect(),
        }
    }

    /// Unmapped labels come back unchanged.
    pub fn apply<'a>(&self, label: &'a str) -> &'a str {
        match self.table.get(label) {
            Some(short) => short,
            None => label,
        }
    }
}

impl Default for LabelRemap {
    fn default() -> Self {
        Self::standard()
    }
}

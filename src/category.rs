use std::fmt;

/// Site section a listing belongs to. Selects the extraction strategy chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Realestate,
    Mobility,
    Recommerce,
    Unknown,
}

// Checked in order; the first marker found wins.
const MARKERS: [(&str, Category); 3] = [
    ("/realestate/", Category::Realestate),
    ("/mobility/", Category::Mobility),
    ("/recommerce/", Category::Recommerce),
];

/// Classify a listing URL by its path markers.
pub fn classify(url: &str) -> Category {
    MARKERS
        .iter()
        .find(|(marker, _)| url.contains(marker))
        .map(|&(_, category)| category)
        .unwrap_or(Category::Unknown)
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realestate => "realestate",
            Self::Mobility => "mobility",
            Self::Recommerce => "recommerce",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_section() {
        let cases = [
            ("https://www.finn.no/realestate/homes/ad.html?finnkode=12345", Category::Realestate),
            ("https://www.finn.no/realestate/lettings/ad.html", Category::Realestate),
            ("https://www.finn.no/mobility/item/447730470", Category::Mobility),
            ("https://www.finn.no/mobility/car/car.html", Category::Mobility),
            ("https://www.finn.no/recommerce/forsale/item/445195", Category::Recommerce),
            ("https://www.finn.no/recommerce/generic/item/12345", Category::Recommerce),
        ];
        for (url, expected) in cases {
            assert_eq!(classify(url), expected, "{url}");
        }
    }

    #[test]
    fn unmatched_is_unknown() {
        assert_eq!(classify("https://www.finn.no/other/"), Category::Unknown);
        assert_eq!(classify("https://www.google.com/"), Category::Unknown);
        assert_eq!(classify(""), Category::Unknown);
        // Marker must be a full path segment.
        assert_eq!(classify("https://www.finn.no/realestate"), Category::Unknown);
    }

    #[test]
    fn realestate_outranks_other_markers() {
        assert_eq!(
            classify("https://x/recommerce/a/mobility/b/realestate/c"),
            Category::Realestate
        );
        assert_eq!(classify("https://x/recommerce/mobility/"), Category::Mobility);
    }
}

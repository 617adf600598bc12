//! Language and region detection from ROM file names.
//!
//! Looks at tags in `(...)`, `[...]` and `_..._` groups, e.g.
//! `Game (Europe) (En,Fr,De).zip`.

use std::collections::BTreeSet;
use std::path::Path;

use crate::system::SystemData;

struct LangData {
    tokens: &'static [&'static str],
    lang: &'static str,
    region: &'static str,
}

const LANG_DATA: &[LangData] = &[
    LangData { tokens: &["usa", "us", "u"], lang: "en", region: "us" },
    LangData { tokens: &["europe", "eu", "e", "ue", "euro"], lang: "", region: "eu" },
    LangData { tokens: &["w", "wor", "world"], lang: "en", region: "wr" },
    LangData { tokens: &["uk", "gb"], lang: "en", region: "eu" },
    LangData { tokens: &["es", "spain", "s"], lang: "es", region: "eu" },
    LangData { tokens: &["fr", "france", "fre", "french", "f"], lang: "fr", region: "eu" },
    LangData { tokens: &["de", "germany", "d"], lang: "de", region: "eu" },
    LangData { tokens: &["it", "italy", "i"], lang: "it", region: "eu" },
    LangData { tokens: &["nl", "netherlands"], lang: "nl", region: "eu" },
    LangData { tokens: &["gr", "greece"], lang: "gr", region: "eu" },
    LangData { tokens: &["no"], lang: "no", region: "eu" },
    LangData { tokens: &["sw", "sweden", "se"], lang: "sw", region: "eu" },
    LangData { tokens: &["pt", "portugal"], lang: "pt", region: "eu" },
    LangData { tokens: &["pl", "poland"], lang: "pl", region: "eu" },
    LangData { tokens: &["en"], lang: "en", region: "" },
    LangData { tokens: &["jp", "japan", "ja", "j"], lang: "jp", region: "jp" },
    LangData { tokens: &["br", "brazil"], lang: "br", region: "br" },
    LangData { tokens: &["ru", "r"], lang: "ru", region: "ru" },
    LangData { tokens: &["kr", "korea", "k"], lang: "kr", region: "kr" },
    LangData {
        tokens: &["cn", "china", "hong", "kong", "ch", "hk", "as", "tw"],
        lang: "cn",
        region: "cn",
    },
    LangData { tokens: &["canada", "ca", "c", "fc"], lang: "fr", region: "wr" },
    LangData { tokens: &["in", "india"], lang: "in", region: "in" },
];

/// Region tokens that win over a softer region seen earlier in the name.
const HARD_REGIONS: &[&str] = &["usa", "us", "europe", "eu", "brazil", "br", "japan", "jp", "kr", "korea"];

/// Systems whose ROMs default to Japanese when the name carries no tag.
const JAPAN_DEFAULTS: &[&str] = &[
    "pc88", "pc98", "pcenginecd", "pcfx", "satellaview", "sg1000", "sufami", "wswan", "wswanc",
    "x68000",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangInfo {
    pub region: String,
    pub languages: BTreeSet<String>,
    hard_region: bool,
}

impl LangInfo {
    /// Detect languages and region for `rom`, applying per-system defaults
    /// when a system is given.
    pub fn parse(rom: &Path, system: Option<&SystemData>) -> Self {
        let mut info = Self::default();
        let file_name = rom
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if file_name.is_empty() {
            return info;
        }

        for group in extract_between(&file_name, '(', ')')
            .into_iter()
            .chain(extract_between(&file_name, '[', ']'))
            .chain(extract_between(&file_name, '_', '_'))
        {
            info.extract(group);
        }

        if let Some(system) = system {
            info.apply_system_defaults(system, &file_name);
        }
        info
    }

    fn extract(&mut self, group: &str) {
        for token in group.split(['_', ',', ' ']).filter(|t| !t.is_empty()) {
            let clear_lang = token.contains("t-");
            let token = token.replace("t+", "").replace("t-", "");

            for data in LANG_DATA.iter().filter(|d| d.tokens.contains(&token.as_str())) {
                if !data.lang.is_empty() {
                    if clear_lang {
                        self.languages.clear();
                    }
                    self.languages.insert(data.lang.to_string());
                }
                if !data.region.is_empty() && !self.hard_region {
                    self.region = data.region.to_string();
                    self.hard_region = HARD_REGIONS.contains(&token.as_str());
                }
            }
        }
    }

    fn apply_system_defaults(&mut self, system: &SystemData, file_name: &str) {
        let japan = JAPAN_DEFAULTS.contains(&system.name());
        let arcade = system.has_platform("arcade") || system.has_platform("neogeo");
        let japanese_set = arcade && file_name.ends_with("j.zip");

        if self.region.is_empty() {
            if japan || japanese_set {
                self.region = "jp".to_string();
            } else if arcade {
                self.region = "us".to_string();
            } else if system.name() == "thomson" {
                self.region = "eu".to_string();
            }
        }

        if self.languages.is_empty() {
            let lang = if japan || japanese_set {
                "jp"
            } else if system.name() == "thomson" {
                "fr"
            } else {
                "en"
            };
            self.languages.insert(lang.to_string());
        }
    }

    /// Comma-separated languages, sorted.
    pub fn language_string(&self) -> String {
        self.languages
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty() && self.languages.is_empty()
    }
}

fn extract_between(s: &str, open: char, close: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len_utf8()..];
        let Some(end) = after.find(close) else {
            break;
        };
        out.push(&after[..end]);
        rest = &after[end + close.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemConfig;

    fn parse(name: &str) -> LangInfo {
        LangInfo::parse(Path::new(name), None)
    }

    #[test]
    fn test_usa() {
        let info = parse("Super Game (USA).sfc");
        assert_eq!(info.region, "us");
        assert_eq!(info.language_string(), "en");
    }

    #[test]
    fn test_europe_multi_language() {
        let info = parse("Super Game (Europe) (En,Fr,De).sfc");
        assert_eq!(info.region, "eu");
        assert_eq!(info.language_string(), "de,en,fr");
    }

    #[test]
    fn test_hard_region_sticks() {
        // "Japan" is hard, so the later soft "Fr" tag does not move the region
        let info = parse("Game (Japan) (Fr).zip");
        assert_eq!(info.region, "jp");
        assert!(info.languages.contains("fr"));
    }

    #[test]
    fn test_brackets_and_translation_tag() {
        let info = parse("Game (Japan) [T-En].sfc");
        assert_eq!(info.region, "jp");
        assert_eq!(info.language_string(), "en");
    }

    #[test]
    fn test_no_tags() {
        assert!(parse("Plain Game.sfc").is_empty());
    }

    #[test]
    fn test_arcade_defaults() {
        let mut cfg = SystemConfig::new("mame", "/roms/mame", &["zip"]);
        cfg.platforms = vec!["arcade".to_string()];
        let sys = SystemData::new(cfg);

        let info = LangInfo::parse(Path::new("/roms/mame/sf2.zip"), Some(&sys));
        assert_eq!(info.region, "us");
        assert_eq!(info.language_string(), "en");

        let info = LangInfo::parse(Path::new("/roms/mame/sf2j.zip"), Some(&sys));
        assert_eq!(info.region, "jp");
        assert_eq!(info.language_string(), "jp");
    }

    #[test]
    fn test_extract_between() {
        assert_eq!(extract_between("a (b) c (d", '(', ')'), vec!["b"]);
        assert_eq!(extract_between("x_y_z_w_", '_', '_'), vec!["y", "w"]);
    }
}

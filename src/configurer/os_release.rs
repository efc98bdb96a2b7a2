/// Fields of `/etc/os-release` used to pick a configurer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub id_like: Vec<String>,
    pub name: String,
    pub version_id: String,
}

impl OsRelease {
    pub fn parse(content: &str) -> Self {
        let mut release = OsRelease::default();

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => release.id = value.to_lowercase(),
                "ID_LIKE" => {
                    release.id_like = value.split_whitespace().map(str::to_lowercase).collect()
                }
                "NAME" => release.name = value.to_string(),
                "VERSION_ID" => release.version_id = value.to_string(),
                _ => {}
            }
        }

        release
    }

    /// True if the distribution is `id` or declares itself like it.
    pub fn is(&self, id: &str) -> bool {
        self.id == id || self.id_like.iter().any(|like| like == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flatcar() {
        let release = OsRelease::parse(
            "NAME=\"Flatcar Container Linux by Kinvolk\"\nID=flatcar\nID_LIKE=coreos\nVERSION_ID=3510.2.0\n",
        );
        assert_eq!(release.id, "flatcar");
        assert!(release.is("coreos"));
        assert_eq!(release.version_id, "3510.2.0");
    }

    #[test]
    fn test_parse_ignores_comments_and_blank_lines() {
        let release = OsRelease::parse("# comment\n\nID=\"ubuntu\"\nID_LIKE=debian\n");
        assert_eq!(release.id, "ubuntu");
        assert!(release.is("debian"));
        assert!(!release.is("rhel"));
    }
}

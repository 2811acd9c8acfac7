//! Per-conversion fontconfig override.
//!
//! Templates are authored on desktops with Thai and Office fonts that a server rarely has.
//! Each conversion gets its own `fonts.conf` mapping those families onto metric-compatible
//! substitutes and registering any bundled font directories.

use std::io;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Environment variable fontconfig reads its configuration path from.
pub const FONTCONFIG_FILE_VAR: &str = "FONTCONFIG_FILE";

const SYSTEM_FONTS_CONF: &str = "/etc/fonts/fonts.conf";

/// Family requested by templates and the substitutes tried in order.
pub const FONT_ALIASES: &[(&str, &[&str])] = &[
    ("TH SarabunPSK", &["TH Sarabun New", "Sarabun", "Noto Sans Thai"]),
    ("TH Sarabun PSK", &["TH Sarabun New", "Sarabun", "Noto Sans Thai"]),
    ("TH SarabunIT๙", &["TH Sarabun New", "Sarabun", "Noto Sans Thai"]),
    ("Angsana New", &["Noto Serif Thai", "Loma"]),
    ("AngsanaUPC", &["Noto Serif Thai", "Loma"]),
    ("Cordia New", &["Noto Sans Thai", "Garuda"]),
    ("CordiaUPC", &["Noto Sans Thai", "Garuda"]),
    ("Browallia New", &["Noto Sans Thai", "Umpush"]),
    ("Tahoma", &["DejaVu Sans", "Noto Sans Thai"]),
    ("Calibri", &["Carlito", "Liberation Sans"]),
    ("Cambria", &["Caladea", "Liberation Serif"]),
    ("Times New Roman", &["Liberation Serif"]),
    ("Arial", &["Liberation Sans"]),
    ("Courier New", &["Liberation Mono"]),
];

fn xml_error(err: quick_xml::Error) -> io::Error {
    io::Error::other(format!("failed to write fonts.conf: {}", err))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_document(
    writer: &mut Writer<Vec<u8>>,
    font_dirs: &[PathBuf],
    cache_dir: &Path,
    include_system: bool,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(
        r#"fontconfig SYSTEM "fonts.dtd""#,
    )))?;
    writer.write_event(Event::Start(BytesStart::new("fontconfig")))?;

    if include_system {
        let mut include = BytesStart::new("include");
        include.push_attribute(("ignore_missing", "yes"));
        writer.write_event(Event::Start(include))?;
        writer.write_event(Event::Text(BytesText::new(SYSTEM_FONTS_CONF)))?;
        writer.write_event(Event::End(BytesEnd::new("include")))?;
    }

    for dir in font_dirs {
        text_element(writer, "dir", &dir.to_string_lossy())?;
    }
    text_element(writer, "cachedir", &cache_dir.to_string_lossy())?;

    for (family, substitutes) in FONT_ALIASES {
        let mut alias = BytesStart::new("alias");
        alias.push_attribute(("binding", "same"));
        writer.write_event(Event::Start(alias))?;
        text_element(writer, "family", family)?;
        writer.write_event(Event::Start(BytesStart::new("prefer")))?;
        for substitute in *substitutes {
            text_element(writer, "family", substitute)?;
        }
        writer.write_event(Event::End(BytesEnd::new("prefer")))?;
        writer.write_event(Event::End(BytesEnd::new("alias")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("fontconfig")))
}

/// Build the `fonts.conf` document.
pub fn fontconfig_document(font_dirs: &[PathBuf], cache_dir: &Path) -> io::Result<Vec<u8>> {
    let include_system = Path::new(SYSTEM_FONTS_CONF).exists();
    let mut writer = Writer::new(Vec::new());
    write_document(&mut writer, font_dirs, cache_dir, include_system).map_err(xml_error)?;
    Ok(writer.into_inner())
}

/// Write `fonts.conf` into `work_dir` and return its path.
///
/// Font directories that do not exist are dropped with a warning.
pub async fn write_fontconfig(work_dir: &Path, font_dirs: &[PathBuf]) -> io::Result<PathBuf> {
    let cache_dir = work_dir.join("fontcache");
    tokio::fs::create_dir_all(&cache_dir).await?;

    let mut existing = Vec::with_capacity(font_dirs.len());
    for dir in font_dirs {
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => existing.push(dir.clone()),
            _ => log::warn!("font directory {} does not exist, skipping", dir.display()),
        }
    }

    let path = work_dir.join("fonts.conf");
    tokio::fs::write(&path, fontconfig_document(&existing, &cache_dir)?).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;

    fn document(font_dirs: &[PathBuf], cache_dir: &str) -> String {
        String::from_utf8(fontconfig_document(font_dirs, Path::new(cache_dir)).unwrap()).unwrap()
    }

    #[test]
    fn test_document_lists_aliases_and_dirs() {
        let doc = document(&[PathBuf::from("/opt/fonts/thai")], "/tmp/cache");
        assert!(doc.starts_with("<?xml version=\"1.0\"?><!DOCTYPE fontconfig SYSTEM \"fonts.dtd\">"));
        assert!(doc.contains("<dir>/opt/fonts/thai</dir>"));
        assert!(doc.contains("<cachedir>/tmp/cache</cachedir>"));
        assert!(doc.contains("<alias binding=\"same\"><family>TH SarabunPSK</family>"));
        assert!(doc.contains("<family>Carlito</family>"));
        assert!(doc.ends_with("</fontconfig>"));
    }

    #[test]
    fn test_markup_in_paths_is_escaped() {
        let doc = document(&[PathBuf::from("/srv/R&D <fonts>")], "/tmp/a&b");
        assert!(doc.contains("<dir>/srv/R&amp;D &lt;fonts&gt;</dir>"), "{}", doc);
        assert!(doc.contains("<cachedir>/tmp/a&amp;b</cachedir>"));

        let mut reader = Reader::from_str(&doc);
        let mut families = 0;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"family" => families += 1,
                Event::Eof => break,
                _ => {}
            }
        }
        let expected: usize = FONT_ALIASES.iter().map(|(_, subs)| subs.len() + 1).sum();
        assert_eq!(families, expected);
    }

    #[tokio::test]
    async fn test_missing_font_dirs_are_skipped() {
        let work = tempfile::tempdir().unwrap();
        let fonts = tempfile::tempdir().unwrap();
        let path = write_fontconfig(
            work.path(),
            &[fonts.path().to_path_buf(), work.path().join("nope")],
        )
        .await
        .unwrap();

        let doc = std::fs::read_to_string(path).unwrap();
        assert!(doc.contains(&fonts.path().to_string_lossy().to_string()));
        assert!(!doc.contains("nope"));
        assert!(work.path().join("fontcache").is_dir());
    }
}

//! Gadget Package Integration Test
//!
//! Builds the same gadget package as a plain directory and as a `.gg`
//! archive, then checks that localized lookups, enumeration and writes
//! behave the same through either backend.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use assert_matches::assert_matches;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

use resfs_shared::{
    create_gadget_file_manager, DirFileManager, FileError, FileManager, FileManagerWrapper,
    LocalizedFileManager, ZipFileManager, MANIFEST_FILE,
};

const PACKAGE: &[(&str, &str)] = &[
    ("gadget.gmanifest", "<gadget minimumGoogleDesktopVersion=\"5.0\"/>"),
    ("main.xml", "<view width=\"200\"/>"),
    ("strings.xml", "<strings><NAME>Clock</NAME></strings>"),
    ("global_file", "global"),
    ("en/strings.xml", "<strings><NAME>Clock (en)</NAME></strings>"),
    ("en/help.txt", "en help"),
    ("zh_CN/help.txt", "zh_CN help"),
    ("zh_CN/title.txt", "zh_CN title"),
    ("1033/legacy.txt", "1033 legacy"),
];

/// Test fixture holding one package in both layouts
struct GadgetPackageTest {
    temp_dir: TempDir,
}

impl GadgetPackageTest {
    fn new() -> Self {
        let fixture = Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        };
        fixture.write_directory();
        fixture.write_archive();
        fixture
    }

    fn directory(&self) -> PathBuf {
        self.temp_dir.path().join("clock")
    }

    fn archive(&self) -> PathBuf {
        self.temp_dir.path().join("clock.gg")
    }

    fn write_directory(&self) {
        for (name, contents) in PACKAGE {
            let path = self.directory().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    fn write_archive(&self) {
        let file = fs::File::create(self.archive()).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, contents) in PACKAGE {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn managers(&self, locale: &str) -> Vec<(&'static str, LocalizedFileManager)> {
        vec![
            (
                "directory",
                LocalizedFileManager::with_locale(
                    Box::new(DirFileManager::create(&self.directory(), false).unwrap()),
                    locale,
                ),
            ),
            (
                "archive",
                LocalizedFileManager::with_locale(
                    Box::new(ZipFileManager::create(&self.archive(), false).unwrap()),
                    locale,
                ),
            ),
        ]
    }
}

fn read_string(fm: &mut dyn FileManager, file: &str) -> String {
    String::from_utf8(fm.read_file(file).unwrap()).unwrap()
}

#[test]
fn test_localized_lookup_on_both_backends() {
    let fixture = GadgetPackageTest::new();

    for (kind, mut fm) in fixture.managers("zh-CN") {
        assert_eq!(read_string(&mut fm, "global_file"), "global", "{kind}");
        assert_eq!(
            read_string(&mut fm, "strings.xml"),
            "<strings><NAME>Clock</NAME></strings>",
            "{kind}: unlocalized file wins"
        );
        assert_eq!(read_string(&mut fm, "help.txt"), "zh_CN help", "{kind}");
        assert_eq!(read_string(&mut fm, "title.txt"), "zh_CN title", "{kind}");
        assert_eq!(read_string(&mut fm, "legacy.txt"), "1033 legacy", "{kind}");
        assert!(!fm.file_exists("missing.txt"), "{kind}");
        assert_matches!(fm.read_file("missing.txt"), Err(FileError::NotFound { .. }));
    }

    for (kind, mut fm) in fixture.managers("en") {
        assert_eq!(read_string(&mut fm, "help.txt"), "en help", "{kind}");
        assert!(!fm.file_exists("title.txt"), "{kind}");
    }
}

#[test]
fn test_enumeration_matches_between_backends() {
    let fixture = GadgetPackageTest::new();

    let mut expected: Vec<String> = PACKAGE.iter().map(|(name, _)| name.to_string()).collect();
    expected.sort();

    for (kind, mut fm) in fixture.managers("en") {
        let mut files = fm.list_files("").unwrap();
        files.sort();
        assert_eq!(files, expected, "{kind}");

        let mut zh = fm.list_files("zh_CN").unwrap();
        zh.sort();
        assert_eq!(zh, vec!["help.txt", "title.txt"], "{kind}");
    }
}

#[test]
fn test_extract_and_write_on_both_backends() {
    let fixture = GadgetPackageTest::new();
    let target_dir = TempDir::new().unwrap();

    for (kind, mut fm) in fixture.managers("zh-CN") {
        let target = target_dir.path().join(format!("{kind}-help.txt"));
        let extracted = fm.extract_file("help.txt", Some(&target)).unwrap();
        assert_eq!(fs::read_to_string(&extracted).unwrap(), "zh_CN help");

        let scratch = fm.extract_file("main.xml", None).unwrap();
        assert_eq!(fs::read_to_string(&scratch).unwrap(), "<view width=\"200\"/>");

        fm.write_file("options.xml", b"<options/>", false).unwrap();
        assert_eq!(read_string(&mut fm, "options.xml"), "<options/>", "{kind}");
        assert_matches!(
            fm.write_file("options.xml", b"again", false),
            Err(FileError::AlreadyExists { .. })
        );
        fm.write_file("options.xml", b"<options v=\"2\"/>", true).unwrap();
        assert_eq!(read_string(&mut fm, "options.xml"), "<options v=\"2\"/>");

        fm.remove_file("help.txt").unwrap();
        assert!(!fm.file_exists("help.txt"), "{kind}: every localized copy removed");
        assert!(fm.file_exists("title.txt"), "{kind}");
    }
}

#[test]
fn test_archive_changes_survive_reopen() {
    let fixture = GadgetPackageTest::new();

    {
        let mut fm = ZipFileManager::create(&fixture.archive(), false).unwrap();
        fm.write_file("profile.xml", b"<profile/>", false).unwrap();
        fm.remove_file("global_file").unwrap();
    }

    let mut reopened = ZipFileManager::create(&fixture.archive(), false).unwrap();
    assert_eq!(reopened.read_file("profile.xml").unwrap(), b"<profile/>");
    assert!(!reopened.file_exists("global_file"));
    assert_eq!(
        reopened.read_file("main.xml").unwrap(),
        b"<view width=\"200\"/>"
    );
}

#[test]
fn test_gadget_file_manager_from_manifest_path() {
    let fixture = GadgetPackageTest::new();

    let manifest = fixture.directory().join(MANIFEST_FILE);
    let mut from_manifest = create_gadget_file_manager(MANIFEST_FILE, &manifest, "zh-CN").unwrap();
    assert_eq!(read_string(&mut from_manifest, "title.txt"), "zh_CN title");
    assert!(from_manifest.is_directly_accessible("main.xml"));

    let mut from_archive =
        create_gadget_file_manager(MANIFEST_FILE, &fixture.archive(), "zh-CN").unwrap();
    assert_eq!(read_string(&mut from_archive, "title.txt"), "zh_CN title");
    assert!(!from_archive.is_directly_accessible("main.xml"));
}

#[test]
fn test_archive_mounted_over_directory_default() {
    let fixture = GadgetPackageTest::new();
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("other.xml"), "directory other").unwrap();
    fs::create_dir(data.path().join("pkg")).unwrap();
    fs::write(data.path().join("pkg/main.xml"), "shadowed").unwrap();
    fs::write(data.path().join("pkg/local.xml"), "directory local").unwrap();

    let mut wrapper = FileManagerWrapper::new();
    wrapper
        .register_file_manager(
            "pkg/",
            Box::new(ZipFileManager::create(&fixture.archive(), false).unwrap()),
        )
        .unwrap();
    wrapper
        .register_file_manager("", Box::new(DirFileManager::create(data.path(), false).unwrap()))
        .unwrap();

    assert_eq!(read_string(&mut wrapper, "pkg/main.xml"), "<view width=\"200\"/>");
    assert_eq!(read_string(&mut wrapper, "other.xml"), "directory other");
    assert_matches!(
        wrapper.read_file("pkg/local.xml"),
        Err(FileError::NotFound { .. })
    );

    let mut listed = wrapper.list_files("pkg").unwrap();
    listed.sort();
    let mut expected: Vec<String> = PACKAGE.iter().map(|(name, _)| name.to_string()).collect();
    expected.push("local.xml".to_string());
    expected.sort();
    assert_eq!(listed, expected);

    assert_eq!(
        wrapper.full_path("other.xml"),
        Some(data.path().join("other.xml"))
    );
    assert_eq!(
        wrapper.full_path("pkg/main.xml"),
        Some(fixture.archive().join("main.xml"))
    );
}

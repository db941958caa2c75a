use mixfs::hash::{classic_hash, HashKind};
use mixfs::manifest::{Manifest, PackageSpec};
use mixfs::{Error, SourceKind, VirtualFileSystem};
use proptest::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn mix_bytes(files: &[(&str, &[u8])], kind: HashKind) -> Vec<u8> {
    let mut table = Vec::new();
    let mut data = Vec::new();
    for (name, body) in files {
        table.push((kind.hash(name), data.len() as u32, body.len() as u32));
        data.extend_from_slice(body);
    }
    let mut buf = Vec::new();
    buf.extend_from_slice(&(table.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    for (h, o, l) in table {
        buf.extend_from_slice(&h.to_le_bytes());
        buf.extend_from_slice(&o.to_le_bytes());
        buf.extend_from_slice(&l.to_le_bytes());
    }
    buf.extend_from_slice(&data);
    buf
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let mut zw = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, body) in files {
        zw.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        zw.write_all(body).unwrap();
    }
    zw.finish().unwrap();
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn test_plain_mix_scenario() {
    let mut tmp = tempfile::Builder::new().suffix(".mix").tempfile().unwrap();
    let h = classic_hash("rules.ini");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&5u32.to_le_bytes());
    bytes.extend_from_slice(&h.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&5u32.to_le_bytes());
    bytes.extend_from_slice(b"[Gen]");
    tmp.write_all(&bytes).unwrap();
    tmp.flush().unwrap();

    let mut vfs = VirtualFileSystem::new();
    vfs.mount(path_str(tmp.path())).unwrap();
    assert_eq!(vfs.mounts_of_kind(SourceKind::Mix).count(), 1);
    assert_eq!(vfs.read("rules.ini").unwrap(), b"[Gen]");
    assert_eq!(vfs.read("RULES.INI").unwrap(), b"[Gen]");
    assert!(!vfs.exists("art.ini"));
}

#[test]
fn test_mount_priority_across_kinds() {
    let dir = TempDir::new().unwrap();
    let loose = dir.path().join("loose");
    fs::create_dir(&loose).unwrap();
    fs::write(loose.join("rules.ini"), b"loose").unwrap();

    let mix = dir.path().join("main.MIX");
    fs::write(&mix, mix_bytes(&[("rules.ini", b"mix"), ("art.ini", b"mix-art")], HashKind::Classic))
        .unwrap();

    let pkg = dir.path().join("map.oramap");
    write_zip(&pkg, &[("art.ini", b"zip-art"), ("map.yaml", b"yaml")]);

    let mut vfs = VirtualFileSystem::new();
    vfs.mount(path_str(&loose)).unwrap();
    vfs.mount(path_str(&mix)).unwrap();
    vfs.mount(path_str(&pkg)).unwrap();

    assert_eq!(vfs.read("rules.ini").unwrap(), b"loose");
    assert_eq!(vfs.read("art.ini").unwrap(), b"mix-art");
    assert_eq!(vfs.read("map.yaml").unwrap(), b"yaml");
    assert_eq!(vfs.mounts().count(), 3);
}

#[test]
fn test_optional_mount_swallow() {
    let dir = TempDir::new().unwrap();
    let mut vfs = VirtualFileSystem::new();

    let corrupt = dir.path().join("broken.mix");
    fs::write(&corrupt, [0xFFu8; 3]).unwrap();
    vfs.mount(&format!("~{}", corrupt.display())).unwrap();
    vfs.mount(&format!("~{}", dir.path().join("absent").display())).unwrap();
    assert_eq!(vfs.mount_count(), 0);
    assert!(!vfs.exists("broken.mix"));
    assert!(!vfs.exists("rules.ini"));

    let err = vfs.mount(path_str(&corrupt)).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader { .. }));
}

#[test]
fn test_manifest_mounts_folders_then_packages() {
    let dir = TempDir::new().unwrap();
    let loose = dir.path().join("loose");
    fs::create_dir(&loose).unwrap();
    fs::write(loose.join("sound.ini"), b"loose").unwrap();

    let ts = dir.path().join("cache.mix");
    fs::write(&ts, mix_bytes(&[("sound.ini", b"packed"), ("theme.ini", b"t")], HashKind::Crc32))
        .unwrap();

    let manifest = Manifest {
        mounts:   vec![path_str(&loose).to_owned(), format!("~{}", dir.path().join("nope").display())],
        packages: vec![PackageSpec { name: path_str(&ts).to_owned(), hash: Some(HashKind::Crc32) }],
    };
    let json = manifest.to_json().unwrap();
    let manifest_path = dir.path().join("mod.json");
    fs::write(&manifest_path, json).unwrap();

    let mut vfs = VirtualFileSystem::new();
    vfs.load_manifest(&Manifest::from_path(&manifest_path).unwrap()).unwrap();
    assert_eq!(vfs.mount_count(), 2);
    assert_eq!(vfs.read("sound.ini").unwrap(), b"loose");
    assert_eq!(vfs.read("theme.ini").unwrap(), b"t");
}

#[test]
fn test_mount_detects_crc32_archive() {
    let dir = TempDir::new().unwrap();
    let ts = dir.path().join("cache.mix");
    fs::write(&ts, mix_bytes(&[("local mix database.dat", b"db"), ("theme.ini", b"t")],
                             HashKind::Crc32))
        .unwrap();

    let mut vfs = VirtualFileSystem::new();
    vfs.mount(path_str(&ts)).unwrap();
    assert_eq!(vfs.read("theme.ini").unwrap(), b"t");
    assert!(!vfs.exists("rules.ini"));
}

#[test]
fn test_open_with_exts_over_archives() {
    let dir = TempDir::new().unwrap();
    let mix = dir.path().join("conquer.mix");
    fs::write(&mix, mix_bytes(&[("e1.shp", b"sprite"), ("e1.aud", b"sound")], HashKind::Classic))
        .unwrap();

    let mut vfs = VirtualFileSystem::new();
    vfs.mount(path_str(&mix)).unwrap();
    let got = vfs.open_with_exts("e1", &["", ".tem", ".shp"]).unwrap();
    assert_eq!(got.into_bytes().unwrap(), b"sprite");
    assert!(vfs.open_with_exts("e2", &[".shp"]).unwrap_err().is_not_found());
}

#[test]
fn test_unmount_all_releases_everything() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.pal"), b"p").unwrap();
    let mut vfs = VirtualFileSystem::new();
    vfs.mount(path_str(dir.path())).unwrap();
    assert!(vfs.exists("a.pal"));
    vfs.unmount_all();
    assert!(!vfs.exists("a.pal"));
    assert_eq!(vfs.mount_count(), 0);
}

#[test]
fn test_classic_hash_known_values() {
    assert_eq!(classic_hash(""), 0);
    assert_eq!(classic_hash("a"), 0x41);
    assert_eq!(classic_hash("abcde"), 0x8886_84C7);
}

proptest! {
    #[test]
    fn test_hash_is_case_insensitive(name in "[a-zA-Z0-9._]{0,20}") {
        for kind in HashKind::ALL {
            prop_assert_eq!(kind.hash(&name), kind.hash(&name.to_ascii_uppercase()));
            prop_assert_eq!(kind.hash(&name), kind.hash(&name));
        }
    }

    #[test]
    fn test_classic_hash_ignores_tail(head in "[a-z]{12}", a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
        prop_assert_eq!(classic_hash(&format!("{head}{a}")), classic_hash(&format!("{head}{b}")));
    }
}

use camino::{Utf8Path, Utf8PathBuf};
use riivo_patch::{
    apply, discover, export, fst, parser, GameIdentity, GuestMemory, LocalFs, MemoryPatchOutcome,
    NoVolume, PatchSession, RamImage,
};
use std::fs;

const DOCUMENT: &str = r#"<wiidisc version="1" root="/mymod">
  <id game="RMC">
    <region type="E" />
    <region type="P" />
  </id>
  <patch id="tracks">
    <file disc="/Race/Course/castle_course.szs" external="tracks/castle.szs" />
    <file disc="/Race/Course/new_course.szs" external="tracks/castle.szs" create="true" />
    <file disc="/Race/Course/missing.szs" external="tracks/castle.szs" />
  </patch>
  <patch id="saves">
    <folder external="/{$__gameid}{$__region}/save" />
  </patch>
  <patch id="code">
    <memory offset="0x80000010" value="38600001" original="38600000" />
    <memory offset="0x80000020" value="deadbeef" original="00000001" />
  </patch>
</wiidisc>
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("riivo_patch=debug"))
        .with_test_writer()
        .try_init();
}

fn write(path: &Utf8Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// An SD card with one document and its files, plus an extracted disc.
fn fixture() -> (tempfile::TempDir, Utf8PathBuf, Utf8PathBuf) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

    let sd = root.join("sd");
    write(&sd.join("riivolution/mymod.xml"), DOCUMENT.as_bytes());
    write(&sd.join("mymod/tracks/castle.szs"), b"CASTLE");
    write(&sd.join("mymod/RMCP/save/ghost.rkg"), b"GHOST");

    let files = root.join("disc/files");
    write(&files.join("Race/Course/castle_course.szs"), b"original castle");
    write(&files.join("Boot/ghost.rkg"), b"old");
    write(&files.join("Save/ghost.rkg"), b"older");

    (dir, sd, files)
}

#[test]
fn test_disc_patches_end_to_end() {
    let (_dir, sd, files) = fixture();
    let game = GameIdentity::new("RMCP01", 0, 0).unwrap();

    let documents = discover::find_matching_documents(&sd.join("riivolution"), &game);
    assert_eq!(documents.len(), 1);
    let (xml_path, disc) = &documents[0];
    assert_eq!(parser::document_root(xml_path), sd);

    let patches = disc.generate_patches::<&str>(&sd, &[]);
    assert_eq!(patches.len(), 3);

    let mut tree = fst::from_host_dir(&LocalFs, &files).unwrap();
    let mut patched = 0;
    let mut skipped = 0;
    for patch in &patches {
        let stats = apply::apply_patch_to_fst(&LocalFs, patch, &mut tree);
        patched += stats.patched;
        skipped += stats.skipped;
    }
    assert_eq!(patched, 4);
    assert_eq!(skipped, 1);

    let out = sd.parent().unwrap().join("out");
    export::export_tree(&tree, &NoVolume, &LocalFs, &out).unwrap();

    assert_eq!(
        fs::read(out.join("Race/Course/castle_course.szs")).unwrap(),
        b"CASTLE"
    );
    assert_eq!(
        fs::read(out.join("Race/Course/new_course.szs")).unwrap(),
        b"CASTLE"
    );
    assert!(!out.join("Race/Course/missing.szs").exists());
    assert_eq!(fs::read(out.join("Boot/ghost.rkg")).unwrap(), b"GHOST");
    assert_eq!(fs::read(out.join("Save/ghost.rkg")).unwrap(), b"GHOST");
}

#[test]
fn test_memory_patches_end_to_end() {
    let (_dir, sd, _files) = fixture();
    let game = GameIdentity::new("RMCE01", 0, 0).unwrap();

    let xml = sd.join("riivolution/mymod.xml");
    let disc = parser::parse_file(&xml, &game).unwrap();
    let patches = disc.generate_patches(&parser::document_root(&xml), &["code"]);

    let mut ram = RamImage::new(0x8000_0000, vec![0u8; 0x100]);
    ram.write_u32(0x8000_0010, 0x3860_0000);

    let mut session = PatchSession::new(LocalFs);
    assert_eq!(session.load_memory_patches(&patches), 2);
    let outcomes = session.apply_boot_patches(&mut ram);

    assert_eq!(
        outcomes,
        vec![
            MemoryPatchOutcome::Written(4),
            MemoryPatchOutcome::OriginalMismatch
        ]
    );
    assert_eq!(ram.read_u32(0x8000_0010), Some(0x3860_0001));
    assert_eq!(ram.read_u32(0x8000_0020), Some(0));
}

#[test]
fn test_other_region_is_rejected() {
    let (_dir, sd, _files) = fixture();
    let game = GameIdentity::new("RMCJ01", 0, 0).unwrap();

    assert!(parser::parse_file(&sd.join("riivolution/mymod.xml"), &game).is_err());
    assert!(discover::find_matching_documents(&sd, &game).is_empty());
}

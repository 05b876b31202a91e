use super::*;

#[test]
fn classifies_references() {
    assert!(matches!(
        ResourceLocation::parse("https://cdn.example.com/v.m3u8").unwrap(),
        ResourceLocation::Remote(_)
    ));
    assert_eq!(
        ResourceLocation::parse("media/marker.png").unwrap(),
        ResourceLocation::File(PathBuf::from("media/marker.png"))
    );
    assert!(ResourceLocation::parse("ftp://x/y").is_err());
    assert!(ResourceLocation::parse("   ").is_err());
}

#[test]
fn joins_relative_playlist_entries() {
    let base = ResourceLocation::parse("https://cdn.example.com/hls/master.m3u8").unwrap();
    let joined = base.join("720p/index.m3u8").unwrap();
    assert_eq!(
        joined,
        ResourceLocation::Remote(
            url::Url::parse("https://cdn.example.com/hls/720p/index.m3u8").unwrap()
        )
    );

    let local = ResourceLocation::File(PathBuf::from("clips/master.m3u8"));
    assert_eq!(
        local.join("low.m3u8").unwrap(),
        ResourceLocation::File(PathBuf::from("clips").join("low.m3u8"))
    );
}

#[test]
fn fetch_reads_local_files() {
    let dir = std::env::temp_dir().join(format!("arcast_fetch_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("hello.txt");
    std::fs::write(&path, "hello").unwrap();

    let text = fetch_text(path.to_str().unwrap()).unwrap();
    assert_eq!(text, "hello");
    assert!(fetch_bytes(dir.join("missing.bin").to_str().unwrap()).is_err());
}

use lumen_font::testing::MockRasterizer;
use lumen_font::{
    CacheUpdate, FontTexture, FontTextureConfig, GlyphSize, HintParams, SmoothMethod, TextError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn atlas(config: &str) -> FontTexture {
    init_tracing();
    let config: FontTextureConfig = toml::from_str(config).expect("valid atlas config");
    FontTexture::new(Box::new(MockRasterizer::new()), &config).expect("atlas")
}

fn cache(texture: &mut FontTexture, text: &str) -> Result<CacheUpdate, TextError> {
    texture.pre_cache_string(text, 0.8, GlyphSize::DEFAULT, HintParams::default())
}

#[test]
fn first_glyph_marks_texture_updated() {
    let mut texture = atlas("width = 128\nheight = 128\nwidth_cells = 8\nheight_cells = 8");
    assert_eq!((texture.cell_width(), texture.cell_height()), (16, 16));

    let version = texture.version();
    let update = cache(&mut texture, "A").unwrap();

    assert!(update.is_updated());
    assert!(texture.char_slot('A', GlyphSize::DEFAULT).is_some());
    assert_eq!(texture.version(), version + 1);
}

#[test]
fn repeated_glyph_leaves_texture_unchanged() {
    let mut texture = atlas("width = 128\nheight = 128\nwidth_cells = 8\nheight_cells = 8");
    cache(&mut texture, "A").unwrap();
    let version = texture.version();

    assert_eq!(cache(&mut texture, "A").unwrap(), CacheUpdate::Unchanged);
    assert_eq!(texture.version(), version);
}

#[test]
fn single_usable_cell_holds_latest_glyph() {
    let mut texture = atlas("width = 32\nheight = 16\nwidth_cells = 2\nheight_cells = 1");
    texture.create_gradient_slot().unwrap();

    cache(&mut texture, "AB").unwrap();

    assert!(texture.char_slot('A', GlyphSize::DEFAULT).is_none());
    assert!(texture.char_slot('B', GlyphSize::DEFAULT).is_some());
}

#[test]
fn zero_glyph_size_means_default() {
    let mut texture = atlas("width = 128\nheight = 128\nwidth_cells = 8\nheight_cells = 8");
    texture
        .pre_cache_string("A", 0.8, GlyphSize::new(0, 0), HintParams::default())
        .unwrap();

    assert_eq!(
        texture.char_slot('A', GlyphSize::new(0, 0)),
        texture.char_slot('A', GlyphSize::DEFAULT)
    );
    assert_eq!(cache(&mut texture, "A").unwrap(), CacheUpdate::Unchanged);
}

#[test]
fn eviction_follows_request_order() {
    let mut texture = atlas("width = 48\nheight = 16\nwidth_cells = 3\nheight_cells = 1");
    for ch in "abcd".chars() {
        cache(&mut texture, &ch.to_string()).unwrap();
    }

    assert!(texture.char_slot('a', GlyphSize::DEFAULT).is_none());
    for ch in "bcd".chars() {
        assert!(texture.char_slot(ch, GlyphSize::DEFAULT).is_some(), "{ch:?} evicted");
    }

    // Thrashing inside one call: only the last three survive
    cache(&mut texture, "wxyz").unwrap();
    assert!(texture.char_slot('w', GlyphSize::DEFAULT).is_none());
    assert_eq!(texture.resident_glyphs(), 3);
}

#[test]
fn table_and_slots_stay_consistent() {
    let mut texture = atlas("width = 64\nheight = 32\nwidth_cells = 4\nheight_cells = 2");
    texture.create_gradient_slot().unwrap();
    cache(&mut texture, "the quick brown fox jumps over the lazy dog").unwrap();

    let mut seen = Vec::new();
    for slot in texture.slots().iter().filter(|slot| slot.codepoint.is_some()) {
        let ch = slot.codepoint.unwrap();
        let found = texture.char_slot(ch, slot.glyph_size).expect("mapped slot");
        assert_eq!(found.index, slot.index);
        assert!(!seen.contains(&ch), "{ch:?} mapped twice");
        seen.push(ch);
    }
    assert_eq!(seen.len(), texture.resident_glyphs());
    assert_eq!(texture.resident_glyphs(), 7);
}

#[test]
fn smoothing_settings_come_from_config() {
    let texture = atlas(
        r#"
        width = 128
        height = 128
        width_cells = 8
        height_cells = 8
        smooth_method = "supersample"
        smooth_amount = "x4"
        glyph_cache_slots = 3
        "#,
    );
    assert_eq!(texture.smooth_method(), SmoothMethod::Supersample);
    assert_eq!(texture.glyph_cache().slot_count(), 3);
}

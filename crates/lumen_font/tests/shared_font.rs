use lumen_font::testing::MockRasterizer;
use lumen_font::{Font, FontTextureConfig, GlyphSize, SharedFont, TextDrawContext};
use std::sync::Arc;
use std::thread;

fn small_atlas() -> FontTextureConfig {
    // Far fewer cells than the text below needs, so threads keep evicting
    serde_json::from_str(r#"{ "width": 64, "height": 64, "width_cells": 4, "height_cells": 4 }"#)
        .expect("valid atlas config")
}

#[test]
fn font_is_shared_across_threads() {
    let font: SharedFont = Arc::new(Font::new("shared"));
    font.load(vec![1], &small_atlas(), Box::new(MockRasterizer::new()))
        .unwrap();

    let texts = [
        "The quick brown fox",
        "jumps over the lazy dog",
        "ÅÄÖ åäö ÆØ æø",
        "0123456789 !?#%&",
    ];

    let handles: Vec<_> = texts
        .iter()
        .map(|text| {
            let font = Arc::clone(&font);
            let text = text.to_string();
            thread::spawn(move || {
                let ctx = TextDrawContext::default();
                for _ in 0..50 {
                    font.prepare(&text, GlyphSize::DEFAULT).unwrap();
                    let quads = font.create_quads(0.0, 0.0, &text, &ctx).unwrap();
                    assert!(quads.len() <= text.chars().count());
                    assert!(font.text_size(&text, &ctx)[1] >= ctx.size[1]);
                }
            })
        })
        .collect();

    // Render thread: upload whenever the atlas changed
    let uploader = {
        let font = Arc::clone(&font);
        thread::spawn(move || {
            for _ in 0..100 {
                if font.is_texture_dirty() {
                    let bytes = font.with_texture(|texture| texture.buffer().len()).unwrap();
                    assert_eq!(bytes, 64 * 64);
                    font.mark_texture_uploaded().unwrap();
                }
                thread::yield_now();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    uploader.join().unwrap();

    font.with_texture(|texture| {
        assert!(texture.resident_glyphs() <= 15);
        assert!(texture.gradient_slot().is_some());
    })
    .unwrap();
}

#[test]
fn upload_cycle_tracks_changes() {
    let font = Font::new("uploads");
    font.load(vec![1], &small_atlas(), Box::new(MockRasterizer::new()))
        .unwrap();
    assert!(font.is_texture_dirty());

    font.mark_texture_uploaded().unwrap();
    let version = font.texture_version();

    // Only the tail of the ASCII pre-cache fits, so capitals are misses
    assert!(font.add_chars_to_font_texture("ABC", GlyphSize::DEFAULT).unwrap());
    font.mark_texture_uploaded().unwrap();
    assert_eq!(font.texture_version(), version + 1);
    assert!(!font.prepare("ABC", GlyphSize::DEFAULT).unwrap());
}

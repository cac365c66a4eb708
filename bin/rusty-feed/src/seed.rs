//! Demo content for the simulator.

use chrono::{Duration, Utc};
use rf_core::{Media, Post, ReactionSummary};
use uuid::Uuid;

/// `count` posts, newest first, cycling through text-only, image, video and
/// mixed carousels. Every third post belongs to `viewer`.
pub fn posts(viewer: Uuid, count: usize) -> Vec<Post> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let author_id = if i % 3 == 0 { viewer } else { Uuid::now_v7() };
            Post {
                id: Uuid::now_v7(),
                author_id,
                text: format!("Seed post #{i}"),
                media: media_for(i),
                reactions: ReactionSummary::default(),
                comment_count: (i % 4) as u32,
                created_at: now - Duration::minutes(i as i64),
                location: (i % 5 == 0).then(|| "Lisbon".to_string()),
                pending_deletion: false,
            }
        })
        .collect()
}

pub fn media_for(i: usize) -> Vec<Media> {
    let image = |n: usize| Media::image(format!("https://cdn.example/seed/{i}-{n}.jpg"), n);
    let video = |n: usize| {
        Media::video(
            format!("https://cdn.example/seed/{i}-{n}.mp4"),
            Some(format!("https://cdn.example/seed/{i}-{n}-thumb.jpg")),
            n,
        )
    };
    match i % 4 {
        0 => vec![],
        1 => vec![image(0)],
        2 => vec![video(0)],
        _ => vec![image(0), video(1), image(2)],
    }
}

use anyhow::Result;
use pixel_core::CategoryFilter;

use super::{format_size, StorageArgs};

/// Tags shown per row before truncating.
const MAX_TAGS_SHOWN: usize = 3;

pub async fn execute(
    storage: StorageArgs,
    filter: CategoryFilter,
    album: Option<String>,
    query: String,
    json: bool,
) -> Result<()> {
    let mut gallery = storage.gallery().await?;
    gallery.load().await?;

    let records = gallery.view(filter, album.as_deref(), &query);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for record in &records {
        let mut tags = record.tags.iter().take(MAX_TAGS_SHOWN).cloned().collect::<Vec<_>>().join(", ");
        if record.tags.len() > MAX_TAGS_SHOWN {
            tags.push_str(&format!(" +{}", record.tags.len() - MAX_TAGS_SHOWN));
        }

        println!(
            "{} {:<30} {:<13} {:>10}  {}{}",
            if record.liked { "♥" } else { " " },
            record.title,
            record.category,
            format_size(record.size_bytes),
            record.url,
            if tags.is_empty() { String::new() } else { format!("  [{tags}]") },
        );
    }

    let stats = gallery.stats();
    println!(
        "\n{} of {} images shown ({} favorites, {} stored)",
        records.len(),
        stats.total,
        stats.favorites,
        format_size(stats.storage_bytes)
    );

    Ok(())
}

//! List generations command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_list_generations(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let generations = store.list_generations().await?;

    if generations.is_empty() {
        println!("No saved generations.");
        return Ok(());
    }

    println!(
        "Saved generations (showing {} of {})",
        limit.min(generations.len()),
        generations.len()
    );
    println!("{:-<70}", "");

    for generation in generations.into_iter().take(limit) {
        let prompt: String = generation.prompt.chars().take(60).collect();
        println!("• {} {}", generation.created_at, prompt);
        println!("  ID: {}", generation.id);
        println!("  Video: {}", generation.video_url);
        if let (Some(duration), Some(resolution)) = (generation.duration, &generation.resolution) {
            println!("  {duration}s @ {resolution}");
        }
    }

    Ok(())
}

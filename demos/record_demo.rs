//! Walk through the life of a record file.
//!
//! Run with `RUST_LOG=debug` to see page-level activity.

use anyhow::{Context, Result};
use vibedb_rm::{RecordManager, Rid};

const RECORD_SIZE: usize = 32;

fn record(text: &str) -> Vec<u8> {
    let mut data = vec![0u8; RECORD_SIZE];
    let len = text.len().min(RECORD_SIZE);
    data[..len].copy_from_slice(&text.as_bytes()[..len]);
    data
}

fn show(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dir = std::env::temp_dir().join(format!("record_demo_{}", std::process::id()));
    std::fs::create_dir_all(&dir).context("Failed to create demo directory")?;
    let path = dir.join("people.rm");

    let manager = RecordManager::new();
    manager.create_file(&path, RECORD_SIZE)?;
    let mut handle = manager.open_file(&path)?;
    println!(
        "Created {} ({} byte records, {} per page)",
        path.display(),
        handle.record_size()?,
        handle.max_records_per_page()?
    );

    let mut rids: Vec<Rid> = Vec::new();
    for name in ["alice", "bob", "carol"] {
        let rid = handle.insert_record(&record(name))?;
        println!("Inserted {:<8} at {}", name, rid);
        rids.push(rid);
    }

    handle.delete_record(rids[1])?;
    println!("Deleted record at {}", rids[1]);

    let rid = handle.insert_record(&record("dave"))?;
    println!("Inserted {:<8} at {} (reused)", "dave", rid);

    let mut carol = handle.get_record(rids[2])?;
    carol.payload_mut()?.copy_from_slice(&record("carol (updated)"));
    handle.update_record(&carol)?;

    println!("Scan:");
    for record in handle.scan()? {
        let record = record?;
        println!("  {} -> {}", record.rid()?, show(record.payload()?));
    }

    manager.close_file(handle)?;

    let handle = manager.open_file(&path)?;
    println!(
        "Reopened: {} records on {} pages",
        handle.record_count()?,
        handle.page_count()?
    );
    manager.close_file(handle)?;

    manager.destroy_file(&path)?;
    std::fs::remove_dir_all(&dir).context("Failed to remove demo directory")?;
    println!("Destroyed {}", path.display());

    Ok(())
}

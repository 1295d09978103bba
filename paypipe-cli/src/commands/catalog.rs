//! Catalog command handlers

use anyhow::Result;
use colored::*;
use paypipe_client::PipelineClient;

pub async fn services(client: &PipelineClient, search: Option<&str>) -> Result<()> {
    let services = match search {
        Some(query) => client.search_services(query).await?,
        None => client.list_services().await?,
    };

    if services.is_empty() {
        println!("{}", "No services found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} service(s):", services.len()).bold());
    println!();
    for service in services {
        println!("  {} {}", "▸".cyan(), service.name.bold());
        println!("    ID:       {}", service.id.dimmed());
        println!("    Category: {}", service.category);
        println!("    Price:    {}", service.price.to_string().cyan());
        println!("    {}", service.description.dimmed());
        if !service.tags.is_empty() {
            let tags: Vec<&str> = service.tags.iter().map(String::as_str).collect();
            println!("    Tags:     {}", tags.join(", ").dimmed());
        }
        println!();
    }

    Ok(())
}

use std::error::Error;

use crate::cli::setup::{http_client, load_routes, Settings};
use crate::core::endpoints::PluginRoutes;

pub fn print_routes(routes: &PluginRoutes) {
    match routes.server_url() {
        Some(url) => println!("Server: {url}"),
        None => println!("Server: (none declared; function calls will fail)"),
    }
    let endpoints = routes.endpoints();
    if endpoints.is_empty() {
        println!("No operations declared.");
        return;
    }

    let width = endpoints
        .iter_sorted()
        .iter()
        .map(|(operation_id, _)| operation_id.len())
        .max()
        .unwrap_or(0);
    println!("Operations:");
    for (operation_id, endpoint) in endpoints.iter_sorted() {
        println!(
            "  {operation_id:<width$}  {:<6}  {}",
            endpoint.method.to_uppercase(),
            endpoint.path
        );
    }
    for collision in endpoints.collisions() {
        println!(
            "  ⚠️  {} also declared at {} (replaced)",
            collision.operation_id, collision.replaced_path
        );
    }
}

pub async fn list_endpoints(settings: Settings) -> Result<(), Box<dyn Error>> {
    let routes = load_routes(&settings, &http_client()?).await?;
    println!("Document: {}", settings.plugin_document);
    print_routes(&routes);
    Ok(())
}

use std::{env, fs, path::PathBuf};

use restaurant_coupons::openapi::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI document to `openapi/restaurant-coupons.json`, or to the
/// directory given as the first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let json = ApiDoc::openapi().to_pretty_json()?;

    let output_dir = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi"));
    fs::create_dir_all(&output_dir)?;

    let output_path = output_dir.join("restaurant-coupons.json");
    fs::write(&output_path, json)?;

    println!("OpenAPI spec written to {}", output_path.display());
    Ok(())
}

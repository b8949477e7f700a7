use imagegen_core::api::{AppConfig, CliError, Dimensions, GenerateRequest};
use imagegen_plugins::factory::build_generator;

use super::cli::GenerateArgs;

pub async fn generate(args: GenerateArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let generator = build_generator(&cfg)?;
    let model = args.model.unwrap_or_else(|| cfg.client.model.clone());
    let request = GenerateRequest::new(args.prompt, model, Dimensions::new(args.width, args.height));

    let response = generator.generate(&request).await;
    match response.url() {
        Some(url) => {
            println!("{url}");
            Ok(0)
        }
        None => {
            let kind = response.error_kind.map(|k| k.as_str()).unwrap_or("unknown");
            eprintln!("generation failed ({kind}): {}", response.error_message());
            Err(CliError::Generation {
                failed: 1,
                total: 1,
            })
        }
    }
}

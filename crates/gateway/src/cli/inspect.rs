//! `puo-assist classify` and `puo-assist catalogue`: offline views of the
//! routing tables. Neither touches sessions or the data service.

use pa_domain::config::Config;
use pa_routing::{resolve, Classifier, EntityKind, Extractor, SlotMemory, TurnContext, CATALOGUE};

/// Classify each token, then route the whole input as a first turn.
pub fn classify(config: &Config, tokens: &[String]) -> anyhow::Result<()> {
    let classifier = Classifier::new(config.routing.node_id_min_len);

    // A quoted free-text question skips the per-token table.
    if !tokens.iter().any(|t| t.contains(char::is_whitespace)) {
        println!("{:<24} TOKEN", "KIND");
        for token in tokens {
            let id = classifier.classify(token);
            println!("{:<24} {}", id.kind.as_str(), id.raw);
            if let Some(warning) = id.validation_warning() {
                println!("{:<24} ! {warning}", "");
            }
        }
        println!();
    }

    let extractor = Extractor::new(classifier)?;
    let text = tokens.join(" ");
    let turn = extractor.extract(&text);
    let mut memory = SlotMemory::new();
    let ctx = TurnContext {
        turn_index: 0,
        context_version: config.routing.default_major_version.clone(),
    };
    let resolution = resolve(&turn, &mut memory, &ctx);

    println!("extracted:  {}", serde_json::to_string(&turn)?);
    match resolution.operation() {
        Some(op) => println!("routes to:  {} ({})", op.name(), op.descriptor().endpoint),
        None => println!("outcome:    {}", resolution.outcome()),
    }
    println!("resolution: {}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}

pub fn catalogue(json: bool) -> anyhow::Result<()> {
    if json {
        let doc = serde_json::json!({
            "operations": &CATALOGUE[..],
            "components": EntityKind::Component.members(),
            "products": EntityKind::Product.members(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{:<36} {:<40} PARAMETERS", "OPERATION", "ENDPOINT");
    for descriptor in CATALOGUE.iter() {
        let params: Vec<_> = descriptor.required().map(|p| p.as_str()).collect();
        println!(
            "{:<36} {:<40} {}",
            descriptor.name,
            descriptor.endpoint,
            params.join(", ")
        );
    }
    println!();
    println!("components: {}", EntityKind::Component.members().join(", "));
    println!("products:   {}", EntityKind::Product.members().join(", "));
    Ok(())
}

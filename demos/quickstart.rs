//! Quickstart example showing Byzantine filtering with Bicotti

use fedguard::{Bicotti, FederatedServer, ModelParams, ServerState};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("fedguard Quickstart Demo\n");

    let global = ModelParams::from_flat(vec![0.0, 0.0, 0.0]);
    let mut server = FederatedServer::new(Box::new(Bicotti::new(1.0, 0.0)), ServerState::new(global));

    println!("Simulating 9 clients (7 honest, 2 Byzantine)...\n");

    // 7 honest clients with similar updates
    let mut updates: Vec<ModelParams> = (0..7)
        .map(|i| {
            let jitter = 0.01 * i as f32;
            ModelParams::from_flat(vec![1.0 + jitter, 2.0 - jitter, 3.0])
        })
        .collect();

    // 2 Byzantine attackers with extreme values
    updates.push(ModelParams::from_flat(vec![100.0, 200.0, 300.0]));
    updates.push(ModelParams::from_flat(vec![-100.0, -200.0, -300.0]));

    match server.run_round(&updates) {
        Ok(global) => {
            println!("Aggregation complete!");
            println!("   New global model: {:?}", global.flatten());
            println!("   Expected (minus the honest mean): [-1.03, -1.97, -3.0]");
        }
        Err(e) => {
            eprintln!("Aggregation failed: {}", e);
            return;
        }
    }

    if let Some(entry) = server.audit().last() {
        println!("   Rejected clients: {:?}", entry.rejected);
    }
    println!("\nByzantine clients successfully ignored!");
}

//! Compare the aggregation rules under attack

use fedguard::probe::{Activation, LinearProbe};
use fedguard::{
    AggregationMethod, AggregatorConfig, FedGuardError, ModelParams, ProbeSetup, ServerAggregator,
    ServerState,
};
use ndarray::{array, Array2};

fn linear_params(w: f32, b: f32) -> ModelParams {
    ModelParams::new(vec![
        array![[w, 0.5 * w, -w], [0.25 * w, w, 0.0]].into_dyn(),
        array![b, 0.0, -b].into_dyn(),
    ])
}

fn main() -> Result<(), FedGuardError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Comparing Aggregation Methods\n");
    println!("Scenario: 7 honest clients (update ~0.1), 2 Byzantine (update -20.0)\n");

    let global = linear_params(1.0, 0.5);
    let mut updates: Vec<ModelParams> = (0..7)
        .map(|i| linear_params(0.1 + 0.001 * i as f32, 0.05))
        .collect();
    updates.extend(vec![linear_params(-20.0, 10.0); 2]);

    let probe_data: Array2<f32> = array![[1.0, 2.0], [-1.0, 0.5], [0.3, -2.0], [2.0, 1.0], [0.0, 1.0]];
    let honest_step = global.try_sub(&linear_params(0.1, 0.05))?.flatten();

    let methods = vec![
        ("FedAvg (no defense)", AggregationMethod::FedAvg),
        (
            "Mutual information",
            AggregationMethod::Mi {
                sigma_threshold: 2.0,
                strict_statistics: false,
            },
        ),
        (
            "Bicotti",
            AggregationMethod::Bicotti {
                assumed_byzantine: None,
            },
        ),
    ];

    for (name, method) in methods {
        let config = AggregatorConfig {
            method,
            server_lr: 1.0,
            beta: 0.0,
        };
        let probe = ProbeSetup {
            model: Box::new(LinearProbe::new(2, 3, Activation::Softmax)),
            data: probe_data.clone(),
        };

        let result = config
            .build(Some(probe))
            .and_then(|mut agg| agg.apply_gradients(&ServerState::new(global.clone()), &updates));

        match result {
            Ok(outcome) => {
                let value = outcome.state.global.flatten()[0];
                let status = if (value - honest_step[0]).abs() < 0.05 {
                    "ROBUST"
                } else {
                    "CORRUPTED"
                };
                println!(
                    "{:<22} w[0,0]: {:>7.3}  rejected: {:?}  {}",
                    name, value, outcome.rejected, status
                );
            }
            Err(e) => println!("{:<22} failed: {}", name, e),
        }
    }

    println!("\nMutual information and Bicotti defend against the attack; FedAvg does not.");
    Ok(())
}

//! Prime gap prediction with a fluid tree used as a Markov graph
//!
//! Layout: root -> one node per observed gap -> one child per gap that
//! followed it. Training erodes each observed transition; prediction walks
//! from the current gap's node with a small exploration weight.
//!
//! Run with `cargo run --example prime_gaps -- [train_primes] [test_primes]`.

use std::env;

use fluxzero::{index::sidecar_path, FluidTree, NodeId, StateIndex};

/// Fallback when the current gap was never seen during training
const DEFAULT_GAP: u64 = 6;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let train: usize = args.next().map(|a| a.parse()).transpose()?.unwrap_or(100_000);
    let test: usize = args.next().map(|a| a.parse()).transpose()?.unwrap_or(1_000);

    println!("FluxZero Prime Gap Prediction");
    println!("=============================");
    println!();

    let primes = first_primes(train + test);
    let (train_primes, test_primes) = primes.split_at(train);
    let gaps: Vec<u64> = train_primes.windows(2).map(|w| w[1] - w[0]).collect();
    println!("Training on {} gaps", gaps.len());

    let mut tree = FluidTree::new();
    let mut index: StateIndex<(u64, Option<u64>)> = StateIndex::new();
    index.set_root(NodeId::ROOT);

    for w in gaps.windows(2) {
        let (prev, next) = (w[0], w[1]);
        let source = index.get_or_create(&mut tree, NodeId::ROOT, (prev, None))?;
        let edge = index.get_or_create(&mut tree, source, (prev, Some(next)))?;
        tree.backprop(edge, 1.0, 0.5);
    }
    println!("{}", tree.statistics().summary());

    let mut current_prime = *train_primes.last().ok_or("no training primes")?;
    let mut current_gap = gaps.last().copied().unwrap_or(DEFAULT_GAP);
    let mut exact = 0;
    let mut prime_hits = 0;

    for &actual in test_primes {
        let next_gap = match index.get(&(current_gap, None)) {
            Some(source) => {
                let leaf = tree.select_leaf(source, 0.1);
                match index.key_of(leaf) {
                    Some(&(_, Some(gap))) => gap,
                    _ => DEFAULT_GAP,
                }
            }
            None => DEFAULT_GAP,
        };

        let predicted = current_prime + next_gap;
        if predicted == actual {
            exact += 1;
        }
        if is_prime(predicted) {
            prime_hits += 1;
        }

        current_prime = predicted;
        current_gap = next_gap;
    }

    println!();
    println!("Results over the next {} primes", test_primes.len());
    println!("  Exact matches: {}", exact);
    println!("  Primes found:  {}", prime_hits);

    let dir = env::temp_dir();
    let path = dir.join("prime_gaps.flux");
    tree.save(&path)?;
    index.save(sidecar_path(&path))?;
    println!("Saved model to {}", path.display());

    Ok(())
}

/// The first `n` primes by sieving
fn first_primes(n: usize) -> Vec<u64> {
    let estimate = if n < 6 {
        15.0
    } else {
        let n = n as f64;
        n * (n.ln() + n.ln().ln())
    };
    let limit = estimate as usize + 100;

    let mut sieve = vec![true; limit];
    sieve[0] = false;
    sieve[1] = false;
    let mut i = 2;
    while i * i < limit {
        if sieve[i] {
            (i * i..limit).step_by(i).for_each(|j| sieve[j] = false);
        }
        i += 1;
    }

    (0..limit)
        .filter(|&k| sieve[k])
        .take(n)
        .map(|k| k as u64)
        .collect()
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

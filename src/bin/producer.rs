//! Synthetic traffic generator: publishes randomly generated valid orders
//! to the ingest topic at a fixed interval.

use std::time::Duration;

use clap::Parser;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use uuid::Uuid;

use order_core::logging;
use order_core::models::{Delivery, Item, Order, Payment};

#[derive(Debug, Parser)]
#[command(name = "order-producer", about = "Send synthetic order messages to Kafka")]
struct Args {
    /// Kafka bootstrap brokers, comma separated.
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// Topic to write order messages to.
    #[arg(long, default_value = "orders")]
    topic: String,

    /// Number of messages to send.
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Interval between messages in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

/// The documented flag spelling is single-dash (`-brokers`, `-topic`,
/// `-count`, `-interval-ms`); clap only parses double-dash long flags, so
/// rewrite `-flag` to `--flag` up front. Single-character flags (`-h`) and
/// values are left alone.
fn normalize_single_dash_flags(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|arg| {
        if arg.len() > 2 && arg.starts_with('-') && !arg.starts_with("--") {
            format!("-{arg}")
        } else {
            arg
        }
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing("info");
    let args = Args::parse_from(normalize_single_dash_flags(std::env::args()));

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &args.brokers)
        .set("message.timeout.ms", "5000")
        .create()?;

    tracing::info!(
        count = args.count,
        topic = %args.topic,
        brokers = %args.brokers,
        interval_ms = args.interval_ms,
        "starting producer"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut sent = 0u32;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down producer");
                return Ok(());
            }
            _ = ticker.tick() => {
                let order = generate_order();
                let key = order.order_uid.to_string();
                let payload = serde_json::to_vec(&order)?;

                match producer
                    .send(
                        FutureRecord::to(&args.topic).key(&key).payload(&payload),
                        Timeout::After(Duration::from_secs(5)),
                    )
                    .await
                {
                    Ok((partition, offset)) => {
                        tracing::info!(order_uid = %key, partition, offset, "order sent");
                    }
                    Err((err, _)) => {
                        tracing::error!(order_uid = %key, error = %err, "failed to send order");
                    }
                }

                sent += 1;
                if sent >= args.count {
                    tracing::info!(sent, "all messages sent, exiting");
                    return Ok(());
                }
            }
        }
    }
}

fn generate_order() -> Order {
    let order_uid = Uuid::new_v4();
    let track_number = format!("WBTRACK{}", fastrand::u32(100_000..999_999));
    let item_count = fastrand::usize(1..=3);

    let items: Vec<Item> = (0..item_count)
        .map(|_| {
            let price = fastrand::i64(100..10_000);
            let sale = fastrand::i32(0..=70);
            Item {
                chrt_id: fastrand::i64(1_000_000..9_999_999),
                track_number: track_number.clone(),
                price,
                rid: Uuid::new_v4(),
                name: pick(&["Mascaras", "Sneakers", "Notebook", "Headphones", "Kettle"]),
                sale,
                size: pick(&["0", "S", "M", "L"]),
                total_price: (price * i64::from(100 - sale)) / 100,
                nm_id: fastrand::i64(1_000_000..9_999_999),
                brand: pick(&["Vivienne Sabo", "Nike", "Moleskine", "Sony", "Bosch"]),
                status: 202,
            }
        })
        .collect();

    let goods_total: i64 = items.iter().map(|i| i.total_price).sum();
    let delivery_cost = fastrand::i64(300..2_000);

    Order {
        order_uid,
        track_number: track_number.clone(),
        entry: "WBIL".to_string(),
        delivery: Some(Delivery {
            name: pick(&["Test Testov", "Anna Smirnova", "Ivan Petrov"]),
            phone: format!("+7{}", fastrand::u64(9_000_000_000..9_999_999_999)),
            zip: format!("{}", fastrand::u32(100_000..999_999)),
            city: pick(&["Moscow", "Kazan", "Novosibirsk"]),
            address: format!("Lenina {}", fastrand::u32(1..200)),
            region: pick(&["Central", "Volga", "Siberia"]),
            email: format!("user{}@example.com", fastrand::u32(1..10_000)),
        }),
        payment: Some(Payment {
            transaction: order_uid,
            request_id: Uuid::nil(),
            currency: "RUB".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: chrono::Utc::now().timestamp(),
            bank: pick(&["alpha", "sber", "tinkoff"]),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        }),
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: format!("customer-{}", fastrand::u32(1..1_000)),
        delivery_service: pick(&["meest", "cdek", "boxberry"]),
        shardkey: fastrand::u8(1..10).to_string(),
        sm_id: fastrand::i32(1..100),
        date_created: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        oof_shard: "1".to_string(),
    }
}

fn pick(options: &[&str]) -> String {
    options[fastrand::usize(0..options.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Vec<String> {
        normalize_single_dash_flags(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn single_dash_flags_are_rewritten_for_clap() {
        assert_eq!(
            normalize(&["order-producer", "-brokers", "kafka:9092", "-count", "5"]),
            vec!["order-producer", "--brokers", "kafka:9092", "--count", "5"]
        );
    }

    #[test]
    fn double_dash_and_short_flags_pass_through() {
        assert_eq!(
            normalize(&["order-producer", "--topic", "orders", "-h"]),
            vec!["order-producer", "--topic", "orders", "-h"]
        );
    }

    #[test]
    fn parses_documented_flag_spelling() {
        let args = Args::parse_from(normalize(&[
            "order-producer",
            "-brokers",
            "kafka:29092",
            "-topic",
            "orders-dev",
            "-count",
            "3",
            "-interval-ms",
            "250",
        ]));
        assert_eq!(args.brokers, "kafka:29092");
        assert_eq!(args.topic, "orders-dev");
        assert_eq!(args.count, 3);
        assert_eq!(args.interval_ms, 250);
    }
}

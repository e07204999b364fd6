//! Concurrent access through the sequencer handle

use bourse_exchange::model::{AssetBalance, AssetId, OrderStatus, Side, UserId};
use bourse_exchange::{EngineConfig, ExchangeError, Sequencer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::time::timeout;

fn spawn() -> Sequencer {
    let _ = env_logger::try_init();
    Sequencer::spawn(EngineConfig::strict()).unwrap()
}

#[tokio::test]
async fn test_handle_round_trip() {
    let sequencer = spawn();
    let handle = sequencer.handle();

    handle.deposit(1000, "FIAT", dec!(500)).await.unwrap();
    handle.deposit(1001, "STOCK", dec!(3)).await.unwrap();

    let ask = handle
        .create_order(1001, Side::Sell, dec!(100), dec!(3))
        .await
        .unwrap();
    assert_eq!(ask.status, OrderStatus::Pending);

    let bid = handle
        .create_order(1000, Side::Buy, dec!(120), dec!(2))
        .await
        .unwrap();
    assert_eq!(bid.status, OrderStatus::FullyFilled);
    assert_eq!(bid.unfilled_quantity, dec!(0));

    // Reads go straight to the shared ledger
    assert_eq!(
        handle.ledger().balance(1000, AssetId::Fiat),
        Some(AssetBalance::new(dec!(300), dec!(0)))
    );
    assert_eq!(handle.registry().len(), 1);

    let cancelled = handle.cancel_order(1001, ask.sequence_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.unfilled_quantity, dec!(1));

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.bids.is_empty() && snapshot.asks.is_empty());
    assert_eq!(snapshot.last_price, dec!(100));
    assert_eq!(snapshot.last_sequence_id, 2);

    handle.validate().await.unwrap();
    let stats = handle.stats();
    assert_eq!(stats.commands_processed, 6);
    assert_eq!(stats.commands_failed, 0);
    assert!(!stats.halted);

    sequencer.shutdown();
}

#[tokio::test]
async fn test_rejections_come_back_to_caller() {
    let sequencer = spawn();
    let handle = sequencer.handle();

    assert_eq!(
        handle.deposit(7, "FIAT", dec!(1)).await,
        Err(ExchangeError::InvalidUser(7))
    );
    assert!(matches!(
        handle.create_order(1000, Side::Buy, dec!(1), dec!(1)).await,
        Err(ExchangeError::InsufficientFunds { .. })
    ));
    assert_eq!(
        handle.cancel_order(1000, 1).await,
        Err(ExchangeError::OrderNotFound(1))
    );
    assert_eq!(handle.stats().commands_failed, 3);
    assert!(handle.is_alive());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_traders_stay_consistent() {
    let sequencer = spawn();
    let handle = sequencer.handle();

    let traders: Vec<UserId> = (1000..1008).collect();
    let mut tasks = Vec::new();
    for (i, &user_id) in traders.iter().enumerate() {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.deposit(user_id, "FIAT", dec!(100000)).await.unwrap();
            handle.deposit(user_id, "STOCK", dec!(100)).await.unwrap();

            for step in 0..25u32 {
                let offset = Decimal::from((step * 7 + i as u32 * 3) % 20);
                let side = if (step + i as u32) % 2 == 0 {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let price = dec!(990) + offset;
                let result = handle.create_order(user_id, side, price, dec!(0.5)).await;
                assert!(result.is_ok(), "order rejected: {:?}", result);

                if step % 5 == 4 {
                    if let Ok(order) = result {
                        if order.status == OrderStatus::Pending
                            || order.status == OrderStatus::PartiallyFilled
                        {
                            // Another trader may have filled it in the meantime
                            match handle.cancel_order(user_id, order.sequence_id).await {
                                Ok(_) | Err(ExchangeError::OrderNotFound(_)) => {}
                                Err(e) => panic!("cancel failed: {}", e),
                            }
                        }
                    }
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    handle.validate().await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.last_sequence_id, 8 * 25);

    for asset in [AssetId::Fiat, AssetId::Stock] {
        let total: Decimal = snapshot
            .balances
            .iter()
            .filter(|b| b.asset == asset)
            .map(|b| b.available + b.frozen)
            .sum();
        assert_eq!(total, dec!(0));
    }
    if let (Some(bid), Some(ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
        assert!(bid.price < ask.price);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oversized_requests_leave_worker_alive() {
    let sequencer = spawn();
    let handle = sequencer.handle();
    let huge = dec!(100000000000000000000);

    assert_eq!(
        handle.create_order(1000, Side::Buy, huge, huge).await,
        Err(ExchangeError::InvalidQuantity(huge))
    );
    for _ in 0..2 {
        assert_eq!(
            handle.deposit(1000, "FIAT", Decimal::MAX).await,
            Err(ExchangeError::InvalidAmount(Decimal::MAX))
        );
    }
    assert!(handle.is_alive());
    assert!(!handle.stats().halted);

    // The next caller is answered rather than left waiting
    let reply = timeout(Duration::from_secs(5), handle.deposit(1000, "FIAT", dec!(10)))
        .await
        .expect("sequencer stopped answering");
    assert_eq!(reply, Ok(()));
    assert_eq!(handle.stats().commands_failed, 3);
    handle.validate().await.unwrap();

    sequencer.shutdown();
}

#[tokio::test]
async fn test_handle_after_shutdown() {
    let sequencer = spawn();
    let handle = sequencer.handle();
    handle.deposit(1000, "FIAT", dec!(1)).await.unwrap();

    sequencer.shutdown();

    assert!(!handle.is_alive());
    assert_eq!(
        handle.deposit(1000, "FIAT", dec!(1)).await,
        Err(ExchangeError::SequencerShutdown)
    );
    // Shared state outlives the worker
    assert_eq!(
        handle.ledger().balance(1000, AssetId::Fiat),
        Some(AssetBalance::new(dec!(1), dec!(0)))
    );
}

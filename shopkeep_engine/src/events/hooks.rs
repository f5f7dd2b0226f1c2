use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    DepositForfeitedEvent,
    EventHandler,
    EventProducer,
    Handler,
    IdempotentEvent,
    InvoiceReminderEvent,
    OrderArrivedEvent,
    OrderCancelledEvent,
    OrderPaidEvent,
    OrderShippedEvent,
    PaymentLateEvent,
    WalletCreditedEvent,
};

/// Declares, for every event kind, the hook slot, the handler, the producer list, the hook setter and the publish
/// method, so that the four structs below cannot drift apart.
macro_rules! event_hooks {
    ($($hook:ident, $producer:ident, $publish:ident => $event:ty;)+) => {
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producer: Vec<EventProducer<$event>>,)+
        }

        impl EventProducers {
            $(
                pub async fn $publish(&self, event: $event) {
                    for emitter in &self.$producer {
                        debug!("📬️ Publishing {}", event.idempotency_key());
                        emitter.publish_event(event.clone()).await;
                    }
                }
            )+
        }

        pub struct EventHandlers {
            $(pub $hook: Option<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self {
                    $($hook: hooks
                        .$hook
                        .map(|f| EventHandler::new(buffer_size, f).with_concurrency(hooks.concurrency)),)+
                }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    if let Some(handler) = &self.$hook {
                        result.$producer.push(handler.subscribe());
                    }
                )+
                result
            }

            pub async fn start_handlers(self) {
                $(
                    if let Some(handler) = self.$hook {
                        tokio::spawn(async move {
                            handler.start_handler().await;
                        });
                    }
                )+
            }
        }

        #[derive(Clone)]
        pub struct EventHooks {
            /// Handler tasks allowed to run at once, per event kind.
            pub concurrency: usize,
            $(pub $hook: Option<Handler<$event>>,)+
        }

        impl Default for EventHooks {
            fn default() -> Self {
                Self { concurrency: crate::events::DEFAULT_CONCURRENCY, $($hook: None,)+ }
            }
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
                    self.$hook = Some(Arc::new(f));
                    self
                }
            )+
        }
    };
}

event_hooks! {
    on_order_paid, order_paid_producer, publish_order_paid => OrderPaidEvent;
    on_payment_late, payment_late_producer, publish_payment_late => PaymentLateEvent;
    on_wallet_credited, wallet_credited_producer, publish_wallet_credited => WalletCreditedEvent;
    on_order_cancelled, order_cancelled_producer, publish_order_cancelled => OrderCancelledEvent;
    on_order_shipped, order_shipped_producer, publish_order_shipped => OrderShippedEvent;
    on_order_arrived, order_arrived_producer, publish_order_arrived => OrderArrivedEvent;
    on_invoice_reminder, invoice_reminder_producer, publish_invoice_reminder => InvoiceReminderEvent;
    on_deposit_forfeited, deposit_forfeited_producer, publish_deposit_forfeited => DepositForfeitedEvent;
}

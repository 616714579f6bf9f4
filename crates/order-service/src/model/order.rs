use chrono::{DateTime, FixedOffset, Utc};
use ingest_framework::Record;
use serde::{Deserialize, Serialize};

/// A customer order as it travels on the wire, sits in storage and is served to readers.
///
/// # Ingestion
/// This struct implements the [`Record`] trait, so the generic
/// [`StreamConsumer`](ingest_framework::StreamConsumer) can decode, store and cache it.
///
/// Field names are the wire format. Renaming a field breaks every producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    #[serde(default)]
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<FixedOffset>,
    pub oof_shard: String,
}

/// Recipient details. Owned by exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment details. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: DateTime<FixedOffset>,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    /// Discount, in percent.
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl Record for Order {
    type Id = String;

    fn id(&self) -> &String {
        &self.order_uid
    }

    /// Structural checks only. Business rules are not enforced here.
    fn validate(&self) -> Result<(), String> {
        if self.order_uid.trim().is_empty() {
            return Err("order_uid must not be empty".to_string());
        }
        Ok(())
    }
}

impl Order {
    /// The sample order the publisher tool sends: one item, USD payment, timestamps set to now.
    pub fn demo(order_uid: impl Into<String>) -> Self {
        let now = Utc::now().fixed_offset();
        Self {
            order_uid: order_uid.into(),
            track_number: "TN123456".to_string(),
            entry: "entry1".to_string(),
            delivery: Delivery {
                name: "John Wb".to_string(),
                phone: "+1234567890".to_string(),
                zip: "12345".to_string(),
                city: "City Name".to_string(),
                address: "Address Line 1".to_string(),
                region: "Region Name".to_string(),
                email: "john.doe@example.com".to_string(),
            },
            payment: Payment {
                transaction: "txn_123456".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "provider_name".to_string(),
                amount: 100,
                payment_dt: now,
                bank: "Bank Name".to_string(),
                delivery_cost: 5,
                goods_total: 95,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 1,
                track_number: "TN123456".to_string(),
                price: 95,
                rid: "rid123456".to_string(),
                name: "Item Name".to_string(),
                sale: 10,
                size: "M".to_string(),
                total_price: 85,
                nm_id: 123456,
                brand: "Brand Name".to_string(),
                status: 1,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "cust123456".to_string(),
            delivery_service: "delivery_service_name".to_string(),
            shardkey: "shardkey123".to_string(),
            sm_id: 1,
            date_created: now,
            oof_shard: "1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_framework::DecodeError;

    const WIRE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": "2021-11-26T06:22:19+03:00",
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn test_decode_wire_payload() {
        let order = Order::decode(WIRE.as_bytes()).unwrap();

        assert_eq!(order.id(), "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.payment.payment_dt.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].status, 202);
        assert_eq!(order.sm_id, 99);
    }

    #[test]
    fn test_encoding_preserves_every_field() {
        let order = Order::decode(WIRE.as_bytes()).unwrap();
        let again = Order::decode(&order.encode().unwrap()).unwrap();

        assert_eq!(order, again);
        assert_eq!(
            again.payment.payment_dt.to_rfc3339(),
            "2021-11-26T06:22:19+03:00"
        );
    }

    #[test]
    fn test_optional_fields_default() {
        let mut value: serde_json::Value = serde_json::from_str(WIRE).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("items");
        object.remove("internal_signature");
        object["payment"].as_object_mut().unwrap().remove("request_id");

        let order = Order::decode(value.to_string().as_bytes()).unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.internal_signature, "");
        assert_eq!(order.payment.request_id, "");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(WIRE).unwrap();
        value.as_object_mut().unwrap().remove("delivery");

        let err = Order::decode(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_empty_order_uid_is_rejected() {
        let mut order = Order::demo("x");
        order.order_uid = "  ".to_string();

        let err = Order::decode(&serde_json::to_vec(&order).unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid(_)));
    }

    #[test]
    fn test_demo_order() {
        let order = Order::demo("wborder");

        assert_eq!(order.order_uid, "wborder");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.payment.currency, "USD");
        assert_eq!(order.payment.goods_total, order.items[0].price);
        assert!(order.validate().is_ok());
    }
}

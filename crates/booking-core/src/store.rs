//! Booking Store Gateway
//!
//! Boundary to the external data store. Implementations provide per-call
//! atomicity only; nothing here spans multiple calls in a transaction.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{BookingError, Result};
use crate::model::{Booking, Plan, Salon, SalonId, SalonUpdate};

/// Salon and booking persistence (Strategy pattern)
///
/// Implement this for the hosted data store; `MemorySalonStore` backs
/// development and tests.
#[async_trait]
pub trait SalonStore: Send + Sync {
    /// Provision a salon record
    async fn insert_salon(&self, salon: Salon) -> Result<Salon>;

    /// Get salon by id
    async fn get_salon(&self, id: &SalonId) -> Result<Option<Salon>>;

    /// Resolve a public page reference, trying the id first and then the slug
    async fn get_salon_by_id_or_slug(&self, id_or_slug: &str) -> Result<Option<Salon>>;

    /// Current plan of a salon
    async fn get_salon_plan(&self, id: &SalonId) -> Result<Plan> {
        self.get_salon(id)
            .await?
            .map(|salon| salon.plan)
            .ok_or_else(|| BookingError::SalonNotFound(id.to_string()))
    }

    /// All bookings of a salon, in no particular order
    async fn list_bookings_for_salon(&self, salon_id: &SalonId) -> Result<Vec<Booking>>;

    async fn insert_booking(&self, booking: Booking) -> Result<Booking>;

    /// Delete a booking; `false` when it did not exist for that salon
    async fn delete_booking(&self, salon_id: &SalonId, booking_id: Uuid) -> Result<bool>;

    /// Overwrite the given fields of a salon, returning the updated record
    async fn update_salon(&self, id: &SalonId, update: &SalonUpdate) -> Result<Salon>;
}

/// In-memory store (for development)
pub struct MemorySalonStore {
    salons: RwLock<HashMap<SalonId, Salon>>,
    bookings: RwLock<HashMap<SalonId, Vec<Booking>>>,
}

impl Default for MemorySalonStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySalonStore {
    pub fn new() -> Self {
        Self {
            salons: RwLock::new(HashMap::new()),
            bookings: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SalonStore for MemorySalonStore {
    async fn insert_salon(&self, salon: Salon) -> Result<Salon> {
        let mut salons = self.salons.write().await;

        if salons.values().any(|s| s.slug == salon.slug && s.id != salon.id) {
            return Err(BookingError::Storage(format!(
                "slug already taken: {}",
                salon.slug
            )));
        }

        salons.insert(salon.id.clone(), salon.clone());
        Ok(salon)
    }

    async fn get_salon(&self, id: &SalonId) -> Result<Option<Salon>> {
        let salons = self.salons.read().await;
        Ok(salons.get(id).cloned())
    }

    async fn get_salon_by_id_or_slug(&self, id_or_slug: &str) -> Result<Option<Salon>> {
        let salons = self.salons.read().await;

        if let Some(salon) = salons.get(&SalonId::from_string(id_or_slug)) {
            return Ok(Some(salon.clone()));
        }

        Ok(salons.values().find(|s| s.slug == id_or_slug).cloned())
    }

    async fn list_bookings_for_salon(&self, salon_id: &SalonId) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(salon_id).cloned().unwrap_or_default())
    }

    async fn insert_booking(&self, booking: Booking) -> Result<Booking> {
        if !self.salons.read().await.contains_key(&booking.salon_id) {
            return Err(BookingError::SalonNotFound(booking.salon_id.to_string()));
        }

        let mut bookings = self.bookings.write().await;
        bookings
            .entry(booking.salon_id.clone())
            .or_default()
            .push(booking.clone());

        Ok(booking)
    }

    async fn delete_booking(&self, salon_id: &SalonId, booking_id: Uuid) -> Result<bool> {
        let mut bookings = self.bookings.write().await;

        let Some(list) = bookings.get_mut(salon_id) else {
            return Ok(false);
        };

        let before = list.len();
        list.retain(|b| b.id != booking_id);
        Ok(list.len() != before)
    }

    async fn update_salon(&self, id: &SalonId, update: &SalonUpdate) -> Result<Salon> {
        let mut salons = self.salons.write().await;

        let salon = salons
            .get_mut(id)
            .ok_or_else(|| BookingError::SalonNotFound(id.to_string()))?;
        salon.apply(update);

        Ok(salon.clone())
    }
}

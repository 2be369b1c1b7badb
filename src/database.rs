use std::path::Path;

use anyhow::{Context, Result};
use sled::{Db, Tree};
use tracing::info;

use crate::{query::Filter, restaurant::Restaurant};

const RESTAURANT_TREE: &str = "restaurants";

/// Handle to the restaurant collection.
///
/// Opened once with [`Database::connect`] and shared by cloning; the clones
/// refer to the same underlying store. Call [`Database::disconnect`] at
/// shutdown to flush pending writes.
#[derive(Clone)]
pub(crate) struct Database {
    db: Db,
    restaurants: Tree,
}

impl Database {
    fn connect_db(path: &Path) -> Result<Db> {
        sled::open(path).with_context(|| format!("failed to open database at {}", path.display()))
    }

    fn connect_tree(db: &Db, t_name: &str) -> Result<Tree> {
        Ok(db.open_tree(bincode::serialize(t_name)?)?)
    }

    pub(crate) fn connect(path: &Path) -> Result<Database> {
        let db = Database::connect_db(path)?;
        let restaurants = Database::connect_tree(&db, RESTAURANT_TREE)?;
        info!("Connected to database at {}", path.display());
        Ok(Database { db, restaurants })
    }

    pub(crate) fn disconnect(self) -> Result<()> {
        self.db.flush()?;
        info!("Disconnected from database");
        Ok(())
    }

    /// Records are unique by name and address.
    fn key(restaurant: &Restaurant) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&(&restaurant.name, &restaurant.address))?)
    }

    /// Inserts `restaurant` unless one with the same name and address exists.
    ///
    /// Returns `false` for a duplicate.
    pub(crate) fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<bool> {
        let key = Database::key(restaurant)?;
        let value = bincode::serialize(restaurant)?;
        let inserted = self
            .restaurants
            .compare_and_swap(key, None::<&[u8]>, Some(value))?
            .is_ok();
        Ok(inserted)
    }

    /// Returns every restaurant matching `filter`, in key order.
    pub(crate) fn find(&self, filter: &Filter) -> Result<Vec<Restaurant>> {
        let mut found = Vec::new();
        for entry in self.restaurants.iter() {
            let (key, value) = entry?;
            let restaurant: Restaurant = bincode::deserialize(&value)
                .with_context(|| format!("invalid value in database for key {key:02x?}"))?;
            if filter.matches(&restaurant) {
                found.push(restaurant);
            }
        }
        Ok(found)
    }

    pub(crate) fn count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.restaurants.iter() {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Removes all restaurants and returns how many there were.
    #[allow(unused)]
    pub(crate) fn clear(&self) -> Result<usize> {
        let count = self.count()?;
        self.restaurants.clear()?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) struct TestDatabase {
    _dir: tempfile::TempDir, // to prevent the data directory from being deleted while the test is running
    pub(crate) db: Database,
}

#[cfg(test)]
impl TestDatabase {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        Self { _dir: dir, db }
    }

    /// Stores `value` as is, bypassing serialization.
    pub(crate) fn insert_raw(&self, key: &[u8], value: &[u8]) {
        self.db.restaurants.insert(key, value).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{process_query_at, QueryOutcome};

    fn restaurant(name: &str, style: &str, open: &str, close: &str) -> Restaurant {
        Restaurant {
            name: name.to_string(),
            style: style.to_string(),
            address: format!("{name} street"),
            vegetarian: "no".to_string(),
            open_hour: open.to_string(),
            close_hour: close.to_string(),
        }
    }

    fn filter(query: &str) -> Filter {
        match process_query_at(query, "12:00") {
            QueryOutcome::Parsed { filter, .. } => filter,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_database() {
        let test = TestDatabase::new();
        assert_eq!(test.db.count().unwrap(), 0);
        assert!(test.db.find(&filter("italian")).unwrap().is_empty());
    }

    #[test]
    fn duplicate_name_and_address_is_skipped() {
        let test = TestDatabase::new();
        let first = restaurant("Roma", "Italian", "10:00", "22:00");
        assert!(test.db.insert_restaurant(&first).unwrap());

        let mut same_key = first.clone();
        same_key.style = "Asian".to_string();
        assert!(!test.db.insert_restaurant(&same_key).unwrap());

        let mut other_address = first.clone();
        other_address.address = "2 Other Road".to_string();
        assert!(test.db.insert_restaurant(&other_address).unwrap());

        assert_eq!(test.db.count().unwrap(), 2);
    }

    #[test]
    fn find_applies_filter() {
        let test = TestDatabase::new();
        for r in [
            restaurant("Roma", "Italian", "10:00", "22:00"),
            restaurant("Napoli", "Italian", "13:00", "23:00"),
            restaurant("Wok", "Asian", "09:00", "21:00"),
        ] {
            test.db.insert_restaurant(&r).unwrap();
        }

        let names = |query: &str| -> Vec<String> {
            test.db
                .find(&filter(query))
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect()
        };
        assert_eq!(names("italian"), vec!["Roma"]);
        assert_eq!(names("italian closes at 22:30"), vec!["Napoli"]);
        assert_eq!(names("asian between 09:00 and 21:00"), vec!["Wok"]);
        assert!(names("vegetarian").is_empty());
    }

    #[test]
    fn find_fails_on_undecodable_value() {
        let test = TestDatabase::new();
        test.db
            .insert_restaurant(&restaurant("Roma", "Italian", "10:00", "22:00"))
            .unwrap();
        test.insert_raw(b"broken", &[0xff; 3]);

        let err = test.db.find(&filter("italian")).unwrap_err();
        assert!(err.to_string().starts_with("invalid value in database"));
    }

    #[test]
    fn clear_removes_everything() {
        let test = TestDatabase::new();
        test.db
            .insert_restaurant(&restaurant("Roma", "Italian", "10:00", "22:00"))
            .unwrap();
        assert_eq!(test.db.clear().unwrap(), 1);
        assert_eq!(test.db.count().unwrap(), 0);
    }
}

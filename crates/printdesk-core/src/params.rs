//! Custom per-printer parameters.

use crate::error::{FleetError, Result};
use crate::types::{NewParameter, ParameterId, PrinterId, PrinterParameter};
use crate::Fleet;

impl Fleet {
    pub async fn add_printer_parameter(
        &self,
        printer_id: PrinterId,
        new: NewParameter,
    ) -> Result<PrinterParameter> {
        self.require_printer(printer_id).await?;
        let name = new.name.trim();
        if name.is_empty() {
            return Err(FleetError::Validation("parameter name must not be empty".into()));
        }

        let parameter = self
            .store
            .add_parameter(PrinterParameter {
                id: ParameterId::new(),
                printer_id,
                name: name.to_string(),
                value: new.value,
                created_at: self.now(),
            })
            .await?;
        tracing::info!(
            %printer_id,
            parameter_id = %parameter.id,
            name = %parameter.name,
            "printer parameter added"
        );
        Ok(parameter)
    }

    pub async fn printer_parameters(&self, printer_id: PrinterId) -> Result<Vec<PrinterParameter>> {
        self.require_printer(printer_id).await?;
        self.store.list_parameters(printer_id).await
    }

    /// Removes one parameter. A parameter id that belongs to another printer
    /// is reported as not found.
    pub async fn delete_printer_parameter(
        &self,
        printer_id: PrinterId,
        parameter_id: ParameterId,
    ) -> Result<PrinterParameter> {
        self.require_printer(printer_id).await?;
        let removed = self
            .store
            .delete_parameter(printer_id, parameter_id)
            .await?
            .ok_or_else(|| FleetError::not_found("parameter", parameter_id))?;
        tracing::info!(%printer_id, %parameter_id, "printer parameter deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, at};
    use crate::FleetStore;

    fn param(name: &str, value: Option<&str>) -> NewParameter {
        NewParameter {
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn parameters_are_listed_per_printer_in_insertion_order() {
        let h = Harness::new();
        let p1 = h.printer("p1").await;
        let p2 = h.printer("p2").await;

        h.at(1);
        let nozzle = h
            .fleet
            .add_printer_parameter(p1.id, param(" nozzle ", Some("0.4")))
            .await
            .unwrap();
        assert_eq!(nozzle.name, "nozzle");
        assert_eq!(nozzle.created_at, at(1));
        h.at(2);
        h.fleet.add_printer_parameter(p1.id, param("bed", None)).await.unwrap();
        h.fleet.add_printer_parameter(p1.id, param("nozzle", Some("0.6"))).await.unwrap();
        h.fleet.add_printer_parameter(p2.id, param("enclosure", Some("yes"))).await.unwrap();

        let listed: Vec<_> = h
            .fleet
            .printer_parameters(p1.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect();
        assert_eq!(
            listed,
            [
                ("nozzle".to_string(), Some("0.4".to_string())),
                ("bed".to_string(), None),
                ("nozzle".to_string(), Some("0.6".to_string())),
            ]
        );
        assert_eq!(h.fleet.printer_parameters(p2.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_printer_and_blank_names_are_rejected() {
        let h = Harness::new();
        let p = h.printer("p1").await;

        let err = h
            .fleet
            .add_printer_parameter(PrinterId::new(), param("bed", None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(h.fleet.printer_parameters(PrinterId::new()).await.unwrap_err().is_not_found());

        let err = h.fleet.add_printer_parameter(p.id, param("  ", None)).await.unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));
        assert!(h.fleet.printer_parameters(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_scoped_to_the_owning_printer() {
        let h = Harness::new();
        let p1 = h.printer("p1").await;
        let p2 = h.printer("p2").await;
        let bed = h.fleet.add_printer_parameter(p1.id, param("bed", Some("pei"))).await.unwrap();

        let err = h.fleet.delete_printer_parameter(p2.id, bed.id).await.unwrap_err();
        assert!(err.is_not_found());

        let removed = h.fleet.delete_printer_parameter(p1.id, bed.id).await.unwrap();
        assert_eq!(removed, bed);
        assert!(h.fleet.printer_parameters(p1.id).await.unwrap().is_empty());

        let err = h.fleet.delete_printer_parameter(p1.id, bed.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_printer_drops_its_parameters() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        h.fleet.add_printer_parameter(p.id, param("bed", None)).await.unwrap();

        h.store.delete_printer(p.id).await.unwrap().unwrap();
        assert!(h.store.list_parameters(p.id).await.unwrap().is_empty());
    }
}

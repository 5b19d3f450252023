use serde::{Deserialize, Deserializer, Serialize};

use super::date::SireneDate;

/// Read `null` as the type's default, like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ==================================================================================================
// Response envelopes
// ==================================================================================================

/// Status block present in every registry response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "statut")]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    /// Total hits for a search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Offset of the first returned hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debut: Option<u64>,
    /// Number of hits in this page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<u64>,
}

/// Response to `GET /siren/{siren}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SirenResponse {
    pub header: Header,
    #[serde(rename = "uniteLegale")]
    pub legal_unit: LegalUnit,
}

/// Response to `GET /siren?q=...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SirenSearchResponse {
    pub header: Header,
    #[serde(rename = "unitesLegales", default)]
    pub legal_units: Vec<LegalUnit>,
}

// ==================================================================================================
// Legal unit
// ==================================================================================================

/// A legal unit (company, association, sole trader) and its history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalUnit {
    #[serde(default, deserialize_with = "null_as_default")]
    pub siren: String,
    #[serde(rename = "statutDiffusionUniteLegale", default, deserialize_with = "null_as_default")]
    pub diffusion_status: String,
    #[serde(rename = "dateCreationUniteLegale", default)]
    pub creation_date: Option<SireneDate>,
    #[serde(rename = "sigleUniteLegale", default)]
    pub acronym: Option<String>,
    #[serde(rename = "sexeUniteLegale", default)]
    pub sex: Option<String>,
    #[serde(rename = "prenom1UniteLegale", default)]
    pub first_name_1: Option<String>,
    #[serde(rename = "prenom2UniteLegale", default)]
    pub first_name_2: Option<String>,
    #[serde(rename = "prenom3UniteLegale", default)]
    pub first_name_3: Option<String>,
    #[serde(rename = "prenom4UniteLegale", default)]
    pub first_name_4: Option<String>,
    #[serde(rename = "prenomUsuelUniteLegale", default)]
    pub usual_first_name: Option<String>,
    #[serde(rename = "pseudonymeUniteLegale", default)]
    pub pseudonym: Option<String>,
    #[serde(rename = "identifiantAssociationUniteLegale", default)]
    pub association_id: Option<String>,
    #[serde(rename = "trancheEffectifsUniteLegale", default)]
    pub headcount_band: Option<String>,
    #[serde(rename = "anneeEffectifsUniteLegale", default)]
    pub headcount_year: Option<String>,
    #[serde(rename = "dateDernierTraitementUniteLegale", default)]
    pub last_processed: Option<SireneDate>,
    #[serde(rename = "nombrePeriodesUniteLegale", default, deserialize_with = "null_as_default")]
    pub period_count: u32,
    #[serde(default)]
    pub categorie_entreprise: Option<String>,
    #[serde(rename = "anneeCategorieEntreprise", default)]
    pub categorie_year: Option<String>,
    #[serde(rename = "periodesUniteLegale", default)]
    pub periods: Vec<LegalUnitPeriod>,
}

impl LegalUnit {
    /// Period still open (no end date), the unit's current state
    pub fn current_period(&self) -> Option<&LegalUnitPeriod> {
        self.periods
            .iter()
            .find(|p| p.end_date.is_none())
            .or_else(|| self.periods.first())
    }

    /// Display name: denomination, or usage/birth name for individuals
    pub fn display_name(&self) -> Option<&str> {
        let period = self.current_period()?;
        period
            .denomination
            .as_deref()
            .or(period.usage_name.as_deref())
            .or(period.name.as_deref())
    }

    /// Administrative state `A` (active) on the current period
    pub fn is_active(&self) -> bool {
        self.current_period()
            .is_some_and(|p| p.administrative_state == "A")
    }
}

/// One period of a legal unit's history, with the flags telling which fields changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalUnitPeriod {
    #[serde(rename = "dateFin", default)]
    pub end_date: Option<SireneDate>,
    #[serde(rename = "dateDebut", default)]
    pub start_date: Option<SireneDate>,
    #[serde(rename = "etatAdministratifUniteLegale", default, deserialize_with = "null_as_default")]
    pub administrative_state: String,
    #[serde(
        rename = "changementEtatAdministratifUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub administrative_state_changed: bool,
    #[serde(rename = "nomUniteLegale", default)]
    pub name: Option<String>,
    #[serde(rename = "changementNomUniteLegale", default, deserialize_with = "null_as_default")]
    pub name_changed: bool,
    #[serde(rename = "nomUsageUniteLegale", default)]
    pub usage_name: Option<String>,
    #[serde(
        rename = "changementNomUsageUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub usage_name_changed: bool,
    #[serde(rename = "denominationUniteLegale", default)]
    pub denomination: Option<String>,
    #[serde(
        rename = "changementDenominationUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub denomination_changed: bool,
    #[serde(rename = "denominationUsuelle1UniteLegale", default)]
    pub usual_denomination_1: Option<String>,
    #[serde(rename = "denominationUsuelle2UniteLegale", default)]
    pub usual_denomination_2: Option<String>,
    #[serde(rename = "denominationUsuelle3UniteLegale", default)]
    pub usual_denomination_3: Option<String>,
    #[serde(
        rename = "changementDenominationUsuelleUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub usual_denomination_changed: bool,
    #[serde(rename = "categorieJuridiqueUniteLegale", default)]
    pub legal_category: Option<String>,
    #[serde(
        rename = "changementCategorieJuridiqueUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub legal_category_changed: bool,
    #[serde(rename = "activitePrincipaleUniteLegale", default)]
    pub main_activity: Option<String>,
    #[serde(rename = "nomenclatureActivitePrincipaleUniteLegale", default)]
    pub main_activity_nomenclature: Option<String>,
    #[serde(
        rename = "changementActivitePrincipaleUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub main_activity_changed: bool,
    #[serde(rename = "nicSiegeUniteLegale", default)]
    pub head_office_nic: Option<String>,
    #[serde(
        rename = "changementNicSiegeUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub head_office_nic_changed: bool,
    #[serde(rename = "economieSocialeSolidaireUniteLegale", default)]
    pub social_economy: Option<String>,
    #[serde(
        rename = "changementEconomieSocialeSolidaireUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub social_economy_changed: bool,
    #[serde(rename = "caractereEmployeurUniteLegale", default)]
    pub employer: Option<String>,
    #[serde(
        rename = "changementCaractereEmployeurUniteLegale",
        default,
        deserialize_with = "null_as_default",
    )]
    pub employer_changed: bool,
}

use std::fmt;

use pca_adapters::{BrowserError, ExtractError};
use pca_core::DataQualityError;
use pca_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStage {
    BeginTransaction,
    LaunchBrowser,
    OpenPortal,
    SearchOrganization,
    SelectOrganization,
    ReadPlans,
    OpenPlan,
    SavePlan,
    ReadCategories,
    SaveCategory,
    ReadItems,
    SaveItem,
    NextItemsPage,
    ClosePlan,
    CloseBrowser,
    Commit,
}

impl CrawlStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::BeginTransaction => "Erro ao iniciar a transação",
            Self::LaunchBrowser => "Erro ao iniciar o navegador",
            Self::OpenPortal => "Erro ao acessar o portal da transparência",
            Self::SearchOrganization => "Erro ao pesquisar o órgão",
            Self::SelectOrganization => "Erro ao selecionar o órgão",
            Self::ReadPlans => "Erro ao buscar planos",
            Self::OpenPlan => "Erro ao abrir o plano",
            Self::SavePlan => "Erro ao salvar o plano",
            Self::ReadCategories => "Erro ao buscar as categorias do plano",
            Self::SaveCategory => "Erro ao salvar a categoria",
            Self::ReadItems => "Erro ao buscar os itens do plano",
            Self::SaveItem => "Erro ao salvar o item do plano",
            Self::NextItemsPage => "Erro ao avançar a página de itens",
            Self::ClosePlan => "Erro ao fechar o plano",
            Self::CloseBrowser => "Erro ao fechar o navegador",
            Self::Commit => "Erro ao confirmar a transação",
        }
    }
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum CrawlCause {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    DataQuality(#[from] DataQualityError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
#[error("{stage}: {cause}")]
pub struct CrawlError {
    pub stage: CrawlStage,
    #[source]
    pub cause: CrawlCause,
}

impl CrawlError {
    pub fn new(stage: CrawlStage, cause: impl Into<CrawlCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Tags a low-level failure with the stage it happened in.
///
/// Errors that are already `CrawlError`s pass through `?` untouched, so the stage closest to
/// the failure is the one reported.
pub trait StageExt<T> {
    fn at_stage(self, stage: CrawlStage) -> Result<T, CrawlError>;
}

impl<T, E: Into<CrawlCause>> StageExt<T> for Result<T, E> {
    fn at_stage(self, stage: CrawlStage) -> Result<T, CrawlError> {
        self.map_err(|cause| CrawlError::new(stage, cause))
    }
}

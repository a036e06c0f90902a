use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use doctor_cell::models::{Department, DepartmentRequest, DirectoryError, Doctor, RegisterDoctorRequest};
use doctor_cell::services::{DoctorService, InMemoryDoctorDirectory};
use shared_models::auth::Actor;

fn department(name: &str) -> Department {
    Department {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
    }
}

fn doctor(name: &str, department_id: Option<Uuid>) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: None,
        department_id,
        specialization: "General Practice".to_string(),
    }
}

fn service_with(departments: Vec<Department>, doctors: Vec<Doctor>) -> DoctorService {
    DoctorService::new(Arc::new(InMemoryDoctorDirectory::with_entries(departments, doctors)))
}

#[tokio::test]
async fn test_list_doctors_resolves_departments_and_sorts_by_name() {
    let cardiology = department("Cardiology");
    let zed = doctor("Dr. Zed", Some(cardiology.id));
    let amy = doctor("Dr. Amy", None);
    let service = service_with(vec![cardiology.clone()], vec![zed.clone(), amy.clone()]);

    let profiles = service.list_doctors().await.unwrap();

    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].doctor.id, amy.id);
    assert!(profiles[0].department.is_none());
    assert_eq!(profiles[1].doctor.id, zed.id);
    assert_eq!(profiles[1].department.as_ref().map(|d| d.name.as_str()), Some("Cardiology"));
}

#[tokio::test]
async fn test_register_doctor_requires_admin_and_known_department() {
    let service = service_with(vec![], vec![]);
    let request = RegisterDoctorRequest {
        id: Uuid::new_v4(),
        name: "Dr. New".to_string(),
        email: Some("new@clinic.test".to_string()),
        department_id: None,
        specialization: "Dermatology".to_string(),
    };

    assert_matches!(
        service.register_doctor(&Actor::doctor(Uuid::new_v4()), request.clone()).await,
        Err(DirectoryError::Forbidden)
    );

    let admin = Actor::admin(Uuid::new_v4());
    let unknown_department = RegisterDoctorRequest {
        department_id: Some(Uuid::new_v4()),
        ..request.clone()
    };
    assert_matches!(
        service.register_doctor(&admin, unknown_department).await,
        Err(DirectoryError::DepartmentNotFound)
    );

    let registered = service.register_doctor(&admin, request.clone()).await.unwrap();
    assert_eq!(registered.id, request.id);
    assert_eq!(service.get_doctor(request.id).await.unwrap().name, "Dr. New");
}

#[tokio::test]
async fn test_department_lifecycle() {
    let service = service_with(vec![], vec![]);
    let admin = Actor::admin(Uuid::new_v4());

    let created = service
        .create_department(
            &admin,
            DepartmentRequest {
                name: "  Neurology ".to_string(),
                description: Some("".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.name, "Neurology");
    assert!(created.description.is_none());

    let duplicate = service
        .create_department(
            &admin,
            DepartmentRequest {
                name: "neurology".to_string(),
                description: None,
            },
        )
        .await;
    assert_matches!(duplicate, Err(DirectoryError::Conflict(_)));

    let updated = service
        .update_department(
            &admin,
            created.id,
            DepartmentRequest {
                name: "Neurosciences".to_string(),
                description: Some("Brain and nerves".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Neurosciences");

    service.delete_department(&admin, created.id).await.unwrap();
    assert!(service.list_departments().await.unwrap().is_empty());
    assert_matches!(
        service.delete_department(&admin, created.id).await,
        Err(DirectoryError::DepartmentNotFound)
    );
}

#[tokio::test]
async fn test_deleting_department_detaches_doctors() {
    let surgery = department("Surgery");
    let surgeon = doctor("Dr. Cut", Some(surgery.id));
    let service = service_with(vec![surgery.clone()], vec![surgeon.clone()]);

    service
        .delete_department(&Actor::admin(Uuid::new_v4()), surgery.id)
        .await
        .unwrap();

    let remaining = service.get_doctor(surgeon.id).await.unwrap();
    assert!(remaining.department_id.is_none());
}

#[tokio::test]
async fn test_department_validation_and_permissions() {
    let service = service_with(vec![], vec![]);

    assert_matches!(
        service
            .create_department(
                &Actor::admin(Uuid::new_v4()),
                DepartmentRequest {
                    name: "   ".to_string(),
                    description: None,
                },
            )
            .await,
        Err(DirectoryError::ValidationError(_))
    );

    assert_matches!(
        service
            .create_department(
                &Actor::patient(Uuid::new_v4()),
                DepartmentRequest {
                    name: "Oncology".to_string(),
                    description: None,
                },
            )
            .await,
        Err(DirectoryError::Forbidden)
    );
}
